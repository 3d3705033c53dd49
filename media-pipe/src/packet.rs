use bytes::Bytes;
use ffmpeg_next::Rational;

use crate::time::{rescale_duration, rescale_ts};

/// A compressed packet together with the time base its timestamps are in.
///
/// Not `Clone`: the packet is moved from stage to stage and its buffer is
/// released when the last owner drops it.
pub struct RawPacket {
    packet: ffmpeg_next::codec::packet::Packet,
    time_base: Rational,
}

impl RawPacket {
    pub fn new(packet: ffmpeg_next::codec::packet::Packet, time_base: Rational) -> Self {
        Self { packet, time_base }
    }

    pub fn pts(&self) -> Option<i64> {
        self.packet.pts()
    }

    pub fn dts(&self) -> Option<i64> {
        self.packet.dts()
    }

    pub fn duration(&self) -> i64 {
        self.packet.duration()
    }

    pub fn position(&self) -> isize {
        self.packet.position()
    }

    pub fn size(&self) -> usize {
        self.packet.size()
    }

    pub fn index(&self) -> usize {
        self.packet.stream()
    }

    pub fn data(&self) -> Bytes {
        self.packet
            .data()
            .map(Bytes::copy_from_slice)
            .unwrap_or_default()
    }

    pub fn is_key(&self) -> bool {
        self.packet.is_key()
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn set_index(&mut self, index: usize) {
        self.packet.set_stream(index);
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.packet.set_pts(pts);
    }

    pub fn set_dts(&mut self, dts: Option<i64>) {
        self.packet.set_dts(dts);
    }

    pub fn set_duration(&mut self, duration: i64) {
        self.packet.set_duration(duration);
    }

    /// Marks the byte position in the source as unknown.
    pub fn reset_position(&mut self) {
        self.packet.set_position(-1);
    }

    /// Re-expresses pts, dts and duration in `time_base`.
    ///
    /// pts and dts round to nearest, duration truncates.
    pub fn rescale(&mut self, time_base: Rational) {
        if time_base == self.time_base {
            return;
        }
        let src = self.time_base;
        self.packet.set_pts(rescale_ts(self.packet.pts(), src, time_base));
        self.packet.set_dts(rescale_ts(self.packet.dts(), src, time_base));
        self.packet
            .set_duration(rescale_duration(self.packet.duration(), src, time_base));
        self.time_base = time_base;
    }

    pub fn get_mut(&mut self) -> &mut ffmpeg_next::codec::packet::Packet {
        &mut self.packet
    }

    pub fn packet(&self) -> &ffmpeg_next::codec::packet::Packet {
        &self.packet
    }
}

impl From<(ffmpeg_next::codec::packet::Packet, Rational)> for RawPacket {
    fn from((packet, time_base): (ffmpeg_next::codec::packet::Packet, Rational)) -> Self {
        Self::new(packet, time_base)
    }
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::codec::packet::Packet;

    use super::*;

    fn packet(pts: Option<i64>, dts: Option<i64>, duration: i64) -> RawPacket {
        let mut packet = Packet::copy(&[0, 0, 1, 0xb3]);
        packet.set_pts(pts);
        packet.set_dts(dts);
        packet.set_duration(duration);
        packet.set_position(4096);
        RawPacket::new(packet, Rational::new(1, 90_000))
    }

    #[test]
    fn test_rescale_packet() {
        let mut p = packet(Some(3_003), Some(0), 3_003);
        p.rescale(Rational::new(1, 1_000));
        assert_eq!(p.pts(), Some(33));
        assert_eq!(p.dts(), Some(0));
        assert_eq!(p.duration(), 33);
        assert_eq!(p.time_base(), Rational::new(1, 1_000));
        assert_eq!(p.size(), 4);
    }

    #[test]
    fn test_rescale_keeps_unknown_timestamps() {
        let mut p = packet(None, None, 0);
        p.rescale(Rational::new(1, 1_000));
        assert_eq!(p.pts(), None);
        assert_eq!(p.dts(), None);
        assert_eq!(p.duration(), 0);
    }

    #[test]
    fn test_reset_position_and_index() {
        let mut p = packet(Some(0), Some(0), 1);
        assert_eq!(p.position(), 4096);
        p.reset_position();
        assert_eq!(p.position(), -1);
        p.set_index(3);
        assert_eq!(p.index(), 3);
        assert_eq!(&p.data()[..], &[0, 0, 1, 0xb3]);
    }
}
