#[cfg(test)]
mod tests {
    use hwplay::av::testing::{MockAudioDecoder, MockDisplay, MockVideoDecoder, VideoCall};
    use hwplay::av::{ClockReference, DeviceEvent, OsdGeometry};
    use hwplay::config::Config;
    use hwplay::device::{Device, PlayMode};
    use hwplay::error::Result;
    use hwplay::format::PesPacket;
    use hwplay::playback::{Direction, PlaybackSpeed};
    use std::sync::Arc;
    use tokio::time::Duration;

    const MPEG2_FRAME: &[u8] = &[0x00, 0x00, 0x01, 0xb3, 0x2d, 0x02, 0x40, 0x33, 0x24, 0x9f];

    fn setup() -> (Arc<Device>, Arc<MockVideoDecoder>, Arc<MockAudioDecoder>) {
        let video = Arc::new(MockVideoDecoder::new());
        let audio = Arc::new(MockAudioDecoder::new());
        let display = Arc::new(MockDisplay::new(OsdGeometry {
            width: 1280,
            height: 720,
            pixel_aspect: 1.0,
        }));
        let device = Arc::new(Device::new(
            video.clone(),
            audio.clone(),
            display,
            Config::default(),
        ));
        (device, video, audio)
    }

    fn video_packet(pts: i64) -> Vec<u8> {
        PesPacket::new(0xe0, MPEG2_FRAME.to_vec())
            .with_pts(pts)
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_audio_only_start() {
        let (device, video, audio) = setup();
        device.set_play_mode(PlayMode::AudioVideo);

        let packet = PesPacket::new(0xc0, vec![0xff, 0xfb, 0x90, 0x64])
            .with_pts(90_000)
            .to_bytes();
        assert_eq!(device.play_audio(&packet, 0xc0), packet.len());

        let calls = video.calls();
        assert!(calls.contains(&VideoCall::SetClockReference(ClockReference::Audio)));
        assert_eq!(video.clock_starts(), vec![(false, true)]);
        assert_eq!(video.last_clock_scale(), Some(1.0));
        assert_eq!(audio.frames().len(), 1);
    }

    #[test]
    fn test_fast_forward_detected_from_video() {
        let (device, video, _audio) = setup();
        device.set_play_mode(PlayMode::VideoOnly);
        device.request_trick_speed(1, None);

        for pts in [100, 200, 300, 400] {
            let packet = video_packet(pts);
            assert_eq!(device.play_video(&packet, true), packet.len());
        }

        let state = device.playback_state();
        assert_eq!(state.direction, Direction::Forward);
        assert_eq!(state.speed, PlaybackSpeed::Fastest);
        assert_eq!(video.last_clock_scale(), Some(12.0));
        assert!(!device.has_ibp_trick_speed());
    }

    #[test]
    fn test_still_picture_after_clear() -> Result<()> {
        let (device, video, _audio) = setup();
        device.set_play_mode(PlayMode::AudioVideo);
        device.play_video(&video_packet(90_000), true);
        device.clear();
        video.clear_calls();

        device.still_picture(MPEG2_FRAME)?;

        let buffers = video.submitted();
        println!("still picture submitted {} buffers", buffers.len());
        assert_eq!(buffers.len(), 5);
        assert!(buffers[..4].iter().all(|b| b.end_of_frame));
        assert!(buffers[4].end_of_stream);
        Ok(())
    }

    #[tokio::test]
    async fn test_end_of_stream_restarts_clock() -> Result<()> {
        let (device, video, _audio) = setup();
        let events = device.init()?;

        let runner = {
            let device = device.clone();
            tokio::spawn(async move { device.run_events(events).await })
        };

        device.still_picture(MPEG2_FRAME)?;
        assert!(device.poll(Duration::from_millis(100)).await);

        video.clear_calls();
        assert!(video.emit(DeviceEvent::EndOfStream));
        device.deinit()?;
        runner.await.expect("event loop panicked");

        assert_eq!(
            video.calls(),
            vec![
                VideoCall::StopClock,
                VideoCall::SetClockScale(0.0),
                VideoCall::FlushVideo(false),
                VideoCall::ResetReferenceTime,
                VideoCall::SetClockScale(1.0),
                VideoCall::StartClock {
                    has_video: true,
                    has_audio: false
                },
            ]
        );
        Ok(())
    }
}
