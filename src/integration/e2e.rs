//! End-to-end integration tests

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::sync::mpsc::unbounded_channel;

    use crate::adts::{parse_header, AacProfile, AdtsFrames, ADTS_HEADER_LEN};
    use crate::codec::{CodecDevice, CodecMode, CodecPipeline, PipelineEvent, PipelineState};
    use crate::config::CodecConfig;
    use crate::config_file::{InputSpec, LoggingSettings, TranscodeJob};
    use crate::error::{CodecError, TranscodeError};
    use crate::integration::fixtures::{
        constant_frames, ramp, silence, FailingDevice, FakeAacEncoder, Recorder,
    };
    use crate::pcm::chunk::read_i16_le;
    use crate::pcm::{extract_right, resample, BitDepth, MixStrategy, PcmChunk};
    use crate::runner::run_job_with;
    use crate::transcode::{mix_chunks, ChunkNormalizer};

    const WAIT: Duration = Duration::from_secs(5);

    fn mono_48k() -> CodecConfig {
        CodecConfig {
            sample_rate: 48000,
            channels: 1,
            poll_interval_ms: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_silence_gives_one_adts_frame_per_chunk() {
        let recorder = Recorder::new();
        let device = FakeAacEncoder::new();
        let device_released = device.release_counter();
        let pipeline = CodecPipeline::encoder(mono_48k(), recorder.clone());
        pipeline.prepare_with(move |_| Ok(device.boxed())).unwrap();
        pipeline.start().unwrap();

        for _ in 0..10 {
            pipeline.submit(silence(4096)).unwrap();
        }
        pipeline.request_stop();
        assert!(pipeline.wait_released(WAIT));

        let frames = recorder.frames();
        assert_eq!(frames.len(), 10);
        let payload = FakeAacEncoder::payload_len(4096);
        for frame in &frames {
            let header = parse_header(frame).unwrap();
            assert_eq!(header.frame_length as usize, payload + ADTS_HEADER_LEN);
            assert_eq!(frame.len(), payload + ADTS_HEADER_LEN);
            assert_eq!(header.sampling_index, 3);
            assert_eq!(header.channel_config, 1);
            assert_eq!(header.profile, AacProfile::Lc);
        }

        // 2048 mono frames at 48 kHz per chunk
        let expected = (0..10).map(|i| i * 42_666).collect::<Vec<i64>>();
        assert_eq!(recorder.timestamps(), expected);

        assert_eq!(recorder.release_count(), 1);
        assert_eq!(device_released.load(Ordering::SeqCst), 1);
        assert!(recorder.errors.lock().is_empty());

        let stats = pipeline.stats();
        assert_eq!(stats.chunks_submitted, 10);
        assert_eq!(stats.chunks_fed, 10);
        assert_eq!(stats.bytes_in, 40960);
        assert_eq!(stats.frames_emitted, 10);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn test_chunks_come_out_in_submission_order() {
        let recorder = Recorder::new();
        let pipeline = CodecPipeline::encoder(mono_48k(), recorder.clone());
        pipeline
            .prepare_with(|_| Ok(FakeAacEncoder::with_slots(1).boxed()))
            .unwrap();
        pipeline.start().unwrap();

        for i in 0..20u8 {
            pipeline.submit(vec![i; 32]).unwrap();
        }
        pipeline.request_stop();
        assert!(pipeline.wait_released(WAIT));

        let firsts = recorder
            .frames()
            .iter()
            .map(|f| f[ADTS_HEADER_LEN])
            .collect::<Vec<_>>();
        assert_eq!(firsts, (0..20u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_submit_after_stop_is_rejected_but_queue_drains() {
        let recorder = Recorder::new();
        let pipeline = CodecPipeline::encoder(mono_48k(), recorder.clone());
        pipeline.prepare_with(|_| Ok(FakeAacEncoder::new().boxed())).unwrap();
        pipeline.submit(silence(64)).unwrap();
        pipeline.submit(silence(64)).unwrap();
        pipeline.request_stop();
        assert!(matches!(
            pipeline.submit(silence(64)),
            Err(TranscodeError::StopRequested)
        ));

        pipeline.start().unwrap();
        assert!(pipeline.wait_released(WAIT));
        assert_eq!(recorder.frames().len(), 2);
        assert_eq!(pipeline.state(), PipelineState::Released);
    }

    #[test]
    fn test_prepare_failure_reports_error_once() {
        let recorder = Recorder::new();
        let pipeline = CodecPipeline::encoder(mono_48k(), recorder.clone());
        let err = pipeline
            .prepare_with(|_| Err(CodecError::Open("no such codec".into()).into()))
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Codec(CodecError::Open(_))));
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(recorder.errors.lock().len(), 1);
        assert_eq!(recorder.release_count(), 0);
        assert!(pipeline.submit(silence(4)).is_err());
    }

    #[test]
    fn test_device_failure_releases_once() {
        let recorder = Recorder::new();
        let device = FailingDevice::after(3);
        let device_released = device.release_counter();
        let pipeline = CodecPipeline::decoder(mono_48k(), recorder.clone());
        pipeline
            .prepare_with(move |_| Ok(Box::new(device) as Box<dyn CodecDevice>))
            .unwrap();
        for i in 0..6u8 {
            pipeline.submit(vec![i; 8]).unwrap();
        }
        pipeline.request_stop();
        pipeline.start().unwrap();
        assert!(pipeline.wait_released(WAIT));

        let errors = recorder.errors.lock().clone();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("device lost"), "{}", errors[0]);
        assert_eq!(recorder.release_count(), 1);
        assert_eq!(device_released.load(Ordering::SeqCst), 1);
        assert!(recorder.frames().len() <= 3);
        assert_eq!(pipeline.stats().errors, 1);
    }

    #[test]
    fn test_auto_start_skips_ready() {
        let recorder = Recorder::new();
        let config = CodecConfig {
            auto_start: true,
            ..mono_48k()
        };
        let pipeline = CodecPipeline::encoder(config, recorder.clone());
        pipeline.prepare_with(|_| Ok(FakeAacEncoder::new().boxed())).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert_eq!(recorder.ready.load(Ordering::SeqCst), 0);

        pipeline.submit(silence(128)).unwrap();
        pipeline.request_stop();
        assert!(pipeline.wait_released(WAIT));
        assert_eq!(recorder.frames().len(), 1);
    }

    #[tokio::test]
    async fn test_channel_listener_sees_whole_lifecycle() {
        let (tx, mut rx) = unbounded_channel::<PipelineEvent>();
        let pipeline = CodecPipeline::encoder(mono_48k(), tx);
        pipeline.prepare_with(|_| Ok(FakeAacEncoder::new().boxed())).unwrap();
        pipeline.start().unwrap();
        for _ in 0..3 {
            pipeline.submit(silence(256)).unwrap();
        }
        pipeline.request_stop();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event == PipelineEvent::Released;
            events.push(event);
            if done {
                break;
            }
        }

        assert_eq!(events.first(), Some(&PipelineEvent::Ready));
        assert_eq!(events.last(), Some(&PipelineEvent::Released));
        let data = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::Data { .. }))
            .count();
        assert_eq!(data, 3);
    }

    fn encode_job(dir: &std::path::Path, inputs: Vec<Vec<u8>>, input: (u32, u16)) -> TranscodeJob {
        let paths = inputs
            .iter()
            .enumerate()
            .map(|(i, data)| {
                let path = dir.join(format!("input{}.pcm", i));
                std::fs::write(&path, data).unwrap();
                path
            })
            .collect();
        TranscodeJob {
            mode: CodecMode::Encode,
            codec: mono_48k(),
            input: InputSpec {
                paths,
                sample_rate: input.0,
                channels: input.1,
                bit_depth: BitDepth::Bits16,
                chunk_bytes: 4096,
                volume_db: None,
            },
            output: dir.join("out.aac"),
            mix: None,
            logging: LoggingSettings::default(),
        }
    }

    fn read_frames(path: &std::path::Path) -> Vec<(usize, Vec<u8>)> {
        let stream = std::fs::read(path).unwrap();
        AdtsFrames::new(&stream)
            .map(|f| {
                let (header, payload) = f.unwrap();
                (header.frame_length as usize, payload.to_vec())
            })
            .collect()
    }

    #[test]
    fn test_runner_writes_adts_stream() {
        let dir = tempfile::tempdir().unwrap();
        let job = encode_job(dir.path(), vec![silence(10 * 4096)], (48000, 1));
        let stats = run_job_with(&job, |_| Ok(FakeAacEncoder::new().boxed())).unwrap();

        assert_eq!(stats.frames_emitted, 10);
        let frames = read_frames(&job.output);
        assert_eq!(frames.len(), 10);
        for (frame_length, payload) in &frames {
            assert_eq!(payload.len(), 256);
            assert_eq!(*frame_length, 256 + ADTS_HEADER_LEN);
        }
    }

    #[test]
    fn test_runner_converts_layout_before_encoding() {
        let dir = tempfile::tempdir().unwrap();
        // 44.1 kHz stereo in, 48 kHz mono out; three chunks of 1024 frames
        let job = encode_job(
            dir.path(),
            vec![constant_frames(&[1000, -1000], 3 * 1024)],
            (44100, 2),
        );
        let stats = run_job_with(&job, |session| {
            assert_eq!(session.channels(), 1);
            assert_eq!(session.sample_rate(), 48000);
            Ok(FakeAacEncoder::new().boxed())
        })
        .unwrap();

        assert_eq!(stats.chunks_fed, 3);
        let frames = read_frames(&job.output);
        assert_eq!(frames.len(), 3);
        // Left channel only, so every sampled byte pair is 1000
        let expected = 1000i16.to_le_bytes()[0];
        assert!(frames.iter().all(|(_, p)| p.iter().all(|&b| b == expected)));
    }

    #[test]
    fn test_runner_mixes_three_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = encode_job(
            dir.path(),
            vec![silence(8192), silence(8192), silence(8192)],
            (48000, 1),
        );
        job.mix = Some(MixStrategy::Average);
        let stats = run_job_with(&job, |_| Ok(FakeAacEncoder::new().boxed())).unwrap();

        assert_eq!(stats.frames_emitted, 2);
        assert!(read_frames(&job.output)
            .iter()
            .all(|(_, payload)| payload.iter().all(|&b| b == 0)));
    }

    #[test]
    fn test_runner_drops_tail_too_short_to_resample() {
        let dir = tempfile::tempdir().unwrap();
        // One full chunk plus two samples, which become zero samples at 8 kHz
        let mut job = encode_job(dir.path(), vec![silence(4096 + 4)], (48000, 1));
        job.codec.sample_rate = 8000;
        let stats = run_job_with(&job, |_| Ok(FakeAacEncoder::new().boxed())).unwrap();

        assert_eq!(stats.chunks_fed, 1);
        assert_eq!(stats.frames_emitted, 1);
        let frames = read_frames(&job.output);
        assert_eq!(frames.len(), 1);
        // 2048 samples at 48 kHz are 341 samples at 8 kHz
        assert_eq!(frames[0].1.len(), FakeAacEncoder::payload_len(341 * 2));
    }

    #[test]
    fn test_runner_reports_device_failure() {
        let dir = tempfile::tempdir().unwrap();
        let job = encode_job(dir.path(), vec![silence(5 * 4096)], (48000, 1));
        let err = run_job_with(&job, |_| Ok(Box::new(FailingDevice::after(1)) as Box<dyn CodecDevice>))
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Codec(CodecError::Encode(_))));
    }

    #[test]
    fn test_three_track_mix_strategies() {
        let normalizer = ChunkNormalizer::new(48000, 1).unwrap();
        let tracks = [100, 200, 300]
            .iter()
            .map(|&v| PcmChunk::pcm16(constant_frames(&[v], 4), 48000, 1).unwrap())
            .collect::<Vec<_>>();

        let cases = [
            (MixStrategy::Add, 600),
            (MixStrategy::Average, 200),
            (MixStrategy::Extreme, 400),
            (MixStrategy::Weight(vec![1.0, 0.5, 0.0]), 200),
        ];
        for (strategy, expected) in cases {
            let mixed = mix_chunks(&normalizer, &tracks, strategy.clone()).unwrap();
            assert_eq!(
                read_i16_le(mixed.data()),
                vec![expected; 4],
                "strategy {:?}",
                strategy
            );
        }
    }

    #[test]
    fn test_extract_right_then_resample() {
        let stereo = constant_frames(&[1, 2], 8);
        let right = extract_right(&stereo, 2, BitDepth::Bits16).unwrap();
        assert_eq!(read_i16_le(&right), vec![2; 8]);

        let pcm = ramp(4, 300);
        let up = resample(&pcm, 4, 8).unwrap();
        let samples = read_i16_le(&up);
        assert_eq!(samples.len(), 8);
        assert_eq!(samples[0], 0);
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
        assert!(*samples.last().unwrap() <= 900);
    }

    /// Raw AAC-LC access unit of stereo silence at 44.1 kHz
    const SILENT_STEREO_UNIT: [u8; 9] = [0x21, 0x00, 0x49, 0x90, 0x02, 0x19, 0x00, 0x23, 0x80];

    #[test]
    fn test_decode_silent_access_units() {
        let recorder = Recorder::new();
        let config = CodecConfig {
            sample_rate: 44100,
            channels: 2,
            poll_interval_ms: 2,
            ..Default::default()
        };
        let pipeline = CodecPipeline::decoder(config, recorder.clone());
        pipeline.prepare().unwrap();
        pipeline.start().unwrap();
        for _ in 0..3 {
            pipeline.submit(SILENT_STEREO_UNIT.to_vec()).unwrap();
        }
        pipeline.request_stop();
        assert!(pipeline.wait_released(WAIT));

        assert!(recorder.errors.lock().is_empty());
        let frames = recorder.frames();
        // 1024 stereo frames of 16-bit PCM per unit
        assert_eq!(
            frames.iter().map(Bytes::len).collect::<Vec<_>>(),
            vec![4096; 3]
        );
        assert!(frames
            .iter()
            .all(|f| read_i16_le(f).iter().all(|s| s.abs() <= 1)));
        // 1024 samples at 44.1 kHz per unit, in submission order
        assert_eq!(recorder.timestamps(), vec![0, 23_219, 46_438]);
        assert_eq!(recorder.release_count(), 1);
    }

    #[test]
    fn test_encoded_frames_parse_back() {
        let recorder = Recorder::new();
        let config = CodecConfig {
            sample_rate: 44100,
            channels: 2,
            poll_interval_ms: 2,
            ..Default::default()
        };
        let pipeline = CodecPipeline::encoder(config, recorder.clone());
        pipeline.prepare_with(|_| Ok(FakeAacEncoder::new().boxed())).unwrap();
        pipeline.start().unwrap();
        pipeline.submit(Bytes::from(silence(4096))).unwrap();
        pipeline.request_stop();
        assert!(pipeline.wait_released(WAIT));

        let stream = recorder.frames().concat();
        let (header, payload) = AdtsFrames::new(&stream).next().unwrap().unwrap();
        assert_eq!(header.sample_rate(), Some(44100));
        assert_eq!(header.channel_config, 2);
        assert_eq!(payload.len(), 256);
    }
}
