use std::collections::VecDeque;

use ffmpeg_next::{Rational, codec::packet::Packet, format::Pixel};

use super::{EncodeEngine, EncoderSettings, FrameEncoder, VideoEncoder};
use crate::engine::{Drained, EngineState};
use crate::error::{Error, Result};
use crate::frame::RawVideoFrame;
use crate::packet::RawPacket;

/// Encoder stand-in with a fixed lookahead of `delay` frames.
struct LookaheadEncoder {
    delay: usize,
    pending: VecDeque<i64>,
    eof: bool,
}

impl LookaheadEncoder {
    fn new(delay: usize) -> Self {
        Self {
            delay,
            pending: VecDeque::new(),
            eof: false,
        }
    }

    fn has_output(&self) -> bool {
        self.pending.len() > self.delay || (self.eof && !self.pending.is_empty())
    }
}

impl FrameEncoder for LookaheadEncoder {
    type Frame = i64;

    fn send_frame(&mut self, pts: &i64) -> Result<()> {
        if self.has_output() {
            return Err(Error::Encode("output pending, receive first".to_string()));
        }
        self.pending.push_back(*pts);
        Ok(())
    }

    fn send_eof(&mut self) -> Result<()> {
        self.eof = true;
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Drained<RawPacket>> {
        if self.has_output() {
            let pts = self.pending.pop_front().unwrap();
            let mut packet = Packet::copy(&[0, 0, 1, 0xb6]);
            packet.set_pts(Some(pts));
            packet.set_dts(Some(pts));
            Ok(Drained::Item(RawPacket::new(packet, Rational::new(1, 30030))))
        } else if self.eof {
            Ok(Drained::Exhausted)
        } else {
            Ok(Drained::WouldBlock)
        }
    }
}

fn small_settings() -> EncoderSettings {
    EncoderSettings {
        width: 64,
        height: 48,
        codec: "mpeg4".to_string(),
        ..Default::default()
    }
}

fn gray_frame(settings: &EncoderSettings, shade: u8) -> RawVideoFrame {
    let mut frame = RawVideoFrame::new(settings.pixel_format, settings.width, settings.height);
    for plane in 0..frame.planes() {
        let fill = if plane == 0 { shade } else { 128 };
        frame.data_mut(plane).fill(fill);
    }
    frame
}

#[test]
fn test_lookahead_packets_survive_flush() -> anyhow::Result<()> {
    let mut engine = EncodeEngine::new(LookaheadEncoder::new(4));
    let mut pts_out = Vec::new();
    for k in 0..10 {
        engine.submit(Some(&(k * 1001)))?;
        engine.drain(|packet| {
            pts_out.push(packet.pts());
            Ok(())
        })?;
        assert_eq!(engine.state(), EngineState::Idle);
    }
    // four frames are still held back
    assert_eq!(pts_out.len(), 6);

    engine.flush(|packet| {
        pts_out.push(packet.pts());
        Ok(())
    })?;
    assert!(engine.is_finished());
    assert_eq!(engine.frames_submitted(), 10);
    assert_eq!(engine.packets_received(), 10);
    assert_eq!(pts_out.last(), Some(&Some(9 * 1001)));
    Ok(())
}

#[test]
fn test_submit_after_flush_is_rejected() -> anyhow::Result<()> {
    let mut engine = EncodeEngine::new(LookaheadEncoder::new(0));
    engine.flush(|_| Ok(()))?;
    assert!(matches!(engine.submit(Some(&0)), Err(Error::Usage(_))));
    assert!(matches!(engine.receive()?, Drained::Exhausted));
    Ok(())
}

#[test]
fn test_settings_time_base() {
    let settings = EncoderSettings::default();
    assert_eq!(settings.time_base(), Rational::new(1, 30030));
    assert_eq!(settings.frame_rate(), Rational::new(30, 1));
    assert!(settings.validate().is_ok());

    let bad = EncoderSettings {
        fps: 0,
        ..Default::default()
    };
    assert!(matches!(bad.validate(), Err(Error::Config(_))));
}

#[test]
fn test_mpeg4_encodes_every_frame() -> anyhow::Result<()> {
    crate::init()?;
    let settings = small_settings();
    let mut engine = EncodeEngine::new(VideoEncoder::new(&settings, false)?);
    assert_eq!(engine.encoder().codec_name(), "mpeg4");
    assert_eq!(engine.encoder().time_base(), settings.time_base());

    let mut packets = Vec::new();
    for k in 0..5 {
        let mut frame = gray_frame(&settings, 16 + 40 * k as u8);
        frame.set_pts(Some(k * settings.frame_duration));
        engine.submit(Some(&frame))?;
        engine.drain(|packet| {
            packets.push(packet);
            Ok(())
        })?;
    }
    engine.flush(|packet| {
        packets.push(packet);
        Ok(())
    })?;

    assert!(packets.len() >= 5);
    assert!(packets.iter().all(|p| p.duration() == settings.frame_duration));
    let last_pts = packets.iter().filter_map(|p| p.pts()).max();
    assert_eq!(last_pts, Some(4 * settings.frame_duration));
    Ok(())
}

#[test]
fn test_frame_duration_reaches_packets() -> anyhow::Result<()> {
    crate::init()?;
    let settings = small_settings();
    let held = 3 * settings.frame_duration;
    let mut engine = EncodeEngine::new(VideoEncoder::new(&settings, false)?);

    let mut packets = Vec::new();
    for k in 0..4 {
        let mut frame = gray_frame(&settings, 30 * k as u8);
        frame.set_pts(Some(k * held));
        frame.set_duration(held);
        engine.submit(Some(&frame))?;
        engine.drain(|packet| {
            packets.push(packet);
            Ok(())
        })?;
    }
    engine.flush(|packet| {
        packets.push(packet);
        Ok(())
    })?;

    assert_eq!(packets.len(), 4);
    assert!(packets.iter().all(|p| p.duration() == held));
    Ok(())
}

#[test]
fn test_unknown_codec_falls_back() -> anyhow::Result<()> {
    crate::init()?;
    let settings = EncoderSettings {
        codec: "no-such-encoder".to_string(),
        ..small_settings()
    };
    let encoder = VideoEncoder::new(&settings, true)?;
    assert_eq!(encoder.codec_name(), "mpeg4");
    assert_eq!((encoder.width(), encoder.height()), (64, 48));
    Ok(())
}

#[test]
fn test_geometry_mismatch_is_an_encode_error() -> anyhow::Result<()> {
    crate::init()?;
    let settings = small_settings();
    let mut engine = EncodeEngine::new(VideoEncoder::new(&settings, false)?);

    let wrong_size = RawVideoFrame::new(Pixel::YUV420P, 32, 48);
    assert!(matches!(
        engine.submit(Some(&wrong_size)),
        Err(Error::Encode(_))
    ));

    let wrong_format = RawVideoFrame::new(Pixel::RGB24, 64, 48);
    assert!(matches!(
        engine.submit(Some(&wrong_format)),
        Err(Error::Encode(_))
    ));
    assert_eq!(engine.frames_submitted(), 0);
    Ok(())
}
