use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    config::{InterleaveMode, RemuxConfig},
    error::{Error, Result},
    input::AvInput,
    output::MuxSink,
    packet::RawPacket,
    registry::{SourceId, StreamRegistry, StreamSelector},
    time::compare_ts,
};

const VIDEO_SOURCE: SourceId = 0;
const AUDIO_SOURCE: SourceId = 1;

#[derive(Debug, Clone, Serialize)]
pub struct RemuxReport {
    pub output: PathBuf,
    /// Packets written per output stream.
    pub packets_written: Vec<u64>,
    /// Packets read from streams that were not selected.
    pub packets_dropped: u64,
}

impl RemuxReport {
    pub fn streams(&self) -> usize {
        self.packets_written.len()
    }
}

/// Copies the video streams of `video_input` and the audio streams of
/// `audio_input` into `output` without decoding.
///
/// A source without a stream of its kind is skipped with a warning; if
/// neither source contributes a stream nothing is written.
pub fn remux(
    video_input: &Path,
    audio_input: &Path,
    output: &Path,
    config: &RemuxConfig,
) -> Result<RemuxReport> {
    let mut registry = StreamRegistry::new();
    let mut sources = Vec::with_capacity(2);
    for (id, path, selector) in [
        (VIDEO_SOURCE, video_input, StreamSelector::Video),
        (AUDIO_SOURCE, audio_input, StreamSelector::Audio),
    ] {
        let input = AvInput::open(path)?;
        match registry.register(id, input.streams(), selector) {
            Ok(_) => sources.push((id, input)),
            Err(Error::NoMatchingStream { kind, .. }) => {
                log::warn!("{}: no {} stream, skipping", path.display(), kind);
            }
            Err(e) => return Err(e),
        }
    }
    if registry.is_empty() {
        return Err(Error::Config(format!(
            "neither {} has video nor {} has audio",
            video_input.display(),
            audio_input.display()
        )));
    }

    let mut sink = MuxSink::open(output, registry.outputs(), config.format.as_deref())?;
    log::info!(
        "remuxing {} stream(s) into {} ({} interleave)",
        registry.len(),
        output.display(),
        config.interleave
    );

    let copied = {
        let mut write =
            |output_index: usize, packet: RawPacket| forward(&mut sink, output_index, packet);
        match config.interleave {
            InterleaveMode::Sequential => copy_sequential(&registry, &mut sources, &mut write),
            InterleaveMode::Timestamp => copy_by_timestamp(&registry, &mut sources, &mut write),
        }
    };
    let packets_dropped = close_after(&mut sink, copied)?;

    Ok(RemuxReport {
        output: output.to_path_buf(),
        packets_written: (0..sink.stream_count())
            .map(|index| sink.packets_written(index))
            .collect(),
        packets_dropped,
    })
}

/// Source of packets in container order.
trait PacketReader {
    fn next_packet(&mut self) -> Result<Option<RawPacket>>;
}

impl PacketReader for AvInput {
    fn next_packet(&mut self) -> Result<Option<RawPacket>> {
        self.read_packet()
    }
}

/// Closes `sink` whether or not the copy succeeded, so a failed write still
/// gets a trailer attempt. The copy error wins over a trailer error.
fn close_after(sink: &mut MuxSink, copied: Result<u64>) -> Result<u64> {
    let closed = sink.close();
    let dropped = copied?;
    closed?;
    Ok(dropped)
}

/// Rescales a selected packet into its output stream's time base and writes it.
fn forward(sink: &mut MuxSink, output_index: usize, mut packet: RawPacket) -> Result<()> {
    let time_base = sink
        .time_base(output_index)
        .ok_or_else(|| Error::Usage(format!("no output stream {}", output_index)))?;
    packet.rescale(time_base);
    packet.reset_position();
    sink.write(output_index, packet)
}

/// Hands every selected packet to `write` with its output index, one source
/// after the other. Returns the number of dropped packets.
fn copy_sequential<R, W>(
    registry: &StreamRegistry,
    sources: &mut [(SourceId, R)],
    write: &mut W,
) -> Result<u64>
where
    R: PacketReader,
    W: FnMut(usize, RawPacket) -> Result<()>,
{
    let mut dropped = 0;
    for (source, reader) in sources.iter_mut() {
        while let Some(packet) = reader.next_packet()? {
            match registry.lookup(*source, packet.index()) {
                Some(output_index) => write(output_index, packet)?,
                None => dropped += 1,
            }
        }
        log::debug!("source {} drained", source);
    }
    Ok(dropped)
}

/// dts, or pts when the dts is unknown.
fn order_ts(packet: &RawPacket) -> Option<i64> {
    packet.dts().or(packet.pts())
}

/// Packets with unknown timing go first; they cannot be placed otherwise.
fn write_order(a: &RawPacket, b: &RawPacket) -> Ordering {
    match (order_ts(a), order_ts(b)) {
        (Some(ta), Some(tb)) => compare_ts(ta, a.time_base(), tb, b.time_base()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Like [`copy_sequential`], but always hands over the earliest head packet
/// across sources. Ties go to the lower source.
fn copy_by_timestamp<R, W>(
    registry: &StreamRegistry,
    sources: &mut [(SourceId, R)],
    write: &mut W,
) -> Result<u64>
where
    R: PacketReader,
    W: FnMut(usize, RawPacket) -> Result<()>,
{
    let mut dropped = 0;
    let mut heads: Vec<Option<(usize, RawPacket)>> = sources.iter().map(|_| None).collect();
    let mut exhausted = vec![false; sources.len()];

    loop {
        // top up every source with its next selected packet
        for (slot, (source, reader)) in sources.iter_mut().enumerate() {
            while heads[slot].is_none() && !exhausted[slot] {
                match reader.next_packet()? {
                    Some(packet) => match registry.lookup(*source, packet.index()) {
                        Some(output_index) => heads[slot] = Some((output_index, packet)),
                        None => dropped += 1,
                    },
                    None => exhausted[slot] = true,
                }
            }
        }

        let next = heads
            .iter()
            .enumerate()
            .filter_map(|(slot, head)| head.as_ref().map(|(_, packet)| (slot, packet)))
            .min_by(|(_, a), (_, b)| write_order(a, b))
            .map(|(slot, _)| slot);
        let Some(slot) = next else {
            return Ok(dropped);
        };
        if let Some((output_index, packet)) = heads[slot].take() {
            write(output_index, packet)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use ffmpeg_next::{Rational, codec, codec::packet::Packet, media};

    use super::*;
    use crate::stream::test_stream;

    const VIDEO_TB: Rational = Rational(1, 25);
    const AUDIO_TB: Rational = Rational(1, 8000);

    struct QueuedPackets(VecDeque<RawPacket>);

    impl PacketReader for QueuedPackets {
        fn next_packet(&mut self) -> Result<Option<RawPacket>> {
            Ok(self.0.pop_front())
        }
    }

    fn queued(index: usize, time_base: Rational, dts: &[i64]) -> QueuedPackets {
        QueuedPackets(
            dts.iter()
                .map(|&ts| {
                    let mut packet = Packet::copy(&[0, 0, 1, 0xb6]);
                    packet.set_stream(index);
                    packet.set_pts(Some(ts));
                    packet.set_dts(Some(ts));
                    RawPacket::new(packet, time_base)
                })
                .collect(),
        )
    }

    /// Video source with an extra audio stream that is not selected, and an
    /// audio-only source.
    fn two_sources() -> (StreamRegistry, Vec<(SourceId, QueuedPackets)>) {
        let mut registry = StreamRegistry::new();
        let video_streams = [
            test_stream(0, media::Type::Video, codec::Id::MPEG4, VIDEO_TB),
            test_stream(1, media::Type::Audio, codec::Id::PCM_S16LE, AUDIO_TB),
        ];
        let audio_streams = [test_stream(0, media::Type::Audio, codec::Id::PCM_S16LE, AUDIO_TB)];
        registry
            .register(VIDEO_SOURCE, &video_streams, StreamSelector::Video)
            .unwrap();
        registry
            .register(AUDIO_SOURCE, &audio_streams, StreamSelector::Audio)
            .unwrap();

        // video every 40 ms, audio every 20 ms
        let mut video = queued(0, VIDEO_TB, &[0, 1, 2]);
        video.0.extend(queued(1, AUDIO_TB, &[0]).0);
        let audio = queued(0, AUDIO_TB, &[0, 160, 320, 480, 640]);
        (registry, vec![(VIDEO_SOURCE, video), (AUDIO_SOURCE, audio)])
    }

    #[test]
    fn test_timestamp_copy_alternates_sources() -> anyhow::Result<()> {
        let (registry, mut sources) = two_sources();
        let mut written = Vec::new();
        let dropped = copy_by_timestamp(&registry, &mut sources, &mut |index, packet| {
            written.push((index, packet));
            Ok(())
        })?;

        assert_eq!(dropped, 1);
        let order: Vec<usize> = written.iter().map(|(index, _)| *index).collect();
        assert_eq!(order, [0, 1, 1, 0, 1, 1, 0, 1]);
        assert!(
            written
                .windows(2)
                .all(|w| write_order(&w[0].1, &w[1].1) != Ordering::Greater)
        );
        Ok(())
    }

    #[test]
    fn test_sequential_copy_drains_sources_in_turn() -> anyhow::Result<()> {
        let (registry, mut sources) = two_sources();
        let mut order = Vec::new();
        let dropped = copy_sequential(&registry, &mut sources, &mut |index, _| {
            order.push(index);
            Ok(())
        })?;

        assert_eq!(dropped, 1);
        assert_eq!(order, [0, 0, 0, 1, 1, 1, 1, 1]);
        Ok(())
    }

    #[test]
    fn test_failed_write_still_writes_trailer() -> anyhow::Result<()> {
        crate::init()?;
        let dir = tempfile::tempdir()?;
        let (registry, mut sources) = two_sources();
        // the video output alone; the copy fails before audio is reached
        let mut sink = MuxSink::open(dir.path().join("cut.mkv"), &registry.outputs()[..1], None)?;

        let copied = copy_sequential(&registry, &mut sources, &mut |index, packet| {
            if sink.packets_written(0) == 2 {
                return Err(Error::Mux("disk full".to_string()));
            }
            forward(&mut sink, index, packet)
        });
        let err = close_after(&mut sink, copied).unwrap_err();

        assert!(matches!(err, Error::Mux(ref msg) if msg == "disk full"));
        assert_eq!(sink.packets_written(0), 2);
        assert!(sink.trailer_written());
        Ok(())
    }

    fn packet(dts: Option<i64>, time_base: Rational) -> RawPacket {
        let mut packet = Packet::copy(&[1]);
        packet.set_dts(dts);
        RawPacket::new(packet, time_base)
    }

    #[test]
    fn test_write_order_across_time_bases() {
        let video = packet(Some(1), Rational::new(1, 25)); // 40 ms
        let audio = packet(Some(320), Rational::new(1, 8000)); // 40 ms
        let later_audio = packet(Some(321), Rational::new(1, 8000));
        assert_eq!(write_order(&video, &audio), Ordering::Equal);
        assert_eq!(write_order(&video, &later_audio), Ordering::Less);
        assert_eq!(write_order(&later_audio, &video), Ordering::Greater);
    }

    #[test]
    fn test_unknown_timing_goes_first() {
        let mut pts_only = Packet::copy(&[1]);
        pts_only.set_pts(Some(0));
        let pts_only = RawPacket::new(pts_only, Rational::new(1, 25));
        let unknown = packet(None, Rational::new(1, 25));
        let known = packet(Some(5), Rational::new(1, 25));

        assert_eq!(order_ts(&pts_only), Some(0));
        assert_eq!(write_order(&unknown, &known), Ordering::Less);
        assert_eq!(write_order(&pts_only, &known), Ordering::Less);
    }
}
