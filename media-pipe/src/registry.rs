//! Input-to-output stream mapping.
//!
//! The registry is filled once per source before any packet is read and is
//! only queried afterwards. Output indices are handed out contiguously from
//! 0, in the order sources are registered and, within a source, in input
//! stream order.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::stream::{AvStream, MediaKind};

/// Identifies one input container within a run.
pub type SourceId = usize;

/// Which streams of a source are carried to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSelector {
    Video,
    Audio,
    /// The first video or audio stream, whichever comes first.
    FirstFound,
}

impl StreamSelector {
    fn matches(&self, stream: &AvStream) -> bool {
        match self {
            StreamSelector::Video => stream.kind() == MediaKind::Video,
            StreamSelector::Audio => stream.kind() == MediaKind::Audio,
            StreamSelector::FirstFound => stream.kind() != MediaKind::Other,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StreamSelector::Video => "video",
            StreamSelector::Audio => "audio",
            StreamSelector::FirstFound => "video or audio",
        }
    }
}

#[derive(Debug, Default)]
pub struct StreamRegistry {
    map: HashMap<(SourceId, usize), usize>,
    outputs: Vec<AvStream>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects every stream of `source` matching `selector`.
    ///
    /// Returns the output indices assigned, in input order. Streams that do
    /// not match are left unmapped and their packets are dropped later.
    pub fn register(
        &mut self,
        source: SourceId,
        streams: &[AvStream],
        selector: StreamSelector,
    ) -> Result<Vec<usize>> {
        let limit = match selector {
            StreamSelector::FirstFound => 1,
            _ => usize::MAX,
        };
        self.register_limited(source, streams, selector, limit)
    }

    /// Like [`register`](Self::register) but keeps only the first match.
    pub fn register_first(
        &mut self,
        source: SourceId,
        streams: &[AvStream],
        selector: StreamSelector,
    ) -> Result<usize> {
        let selected = self.register_limited(source, streams, selector, 1)?;
        Ok(selected[0])
    }

    fn register_limited(
        &mut self,
        source: SourceId,
        streams: &[AvStream],
        selector: StreamSelector,
        limit: usize,
    ) -> Result<Vec<usize>> {
        let mut ordered: Vec<&AvStream> = streams.iter().collect();
        ordered.sort_by_key(|s| s.index());

        let matched: Vec<&AvStream> = ordered
            .into_iter()
            .filter(|s| selector.matches(s))
            .take(limit)
            .collect();
        if matched.is_empty() {
            return Err(Error::NoMatchingStream {
                kind: selector.name(),
                source_id: source,
            });
        }

        let mut selected = Vec::with_capacity(matched.len());
        for input in matched {
            let output_index = self.outputs.len();
            log::info!(
                "map source {} stream {} ({}, {:?}) -> output stream {}",
                source,
                input.index(),
                input.kind(),
                input.codec_id(),
                output_index
            );
            self.map.insert((source, input.index()), output_index);
            self.outputs.push(input.with_index(output_index));
            selected.push(output_index);
        }

        for dropped in streams
            .iter()
            .filter(|s| !self.map.contains_key(&(source, s.index())))
        {
            log::debug!(
                "drop source {} stream {} ({})",
                source,
                dropped.index(),
                dropped.kind()
            );
        }

        Ok(selected)
    }

    /// Output index for a packet of `source`'s stream `input_index`, or
    /// `None` if that stream was dropped.
    pub fn lookup(&self, source: SourceId, input_index: usize) -> Option<usize> {
        self.map.get(&(source, input_index)).copied()
    }

    /// Output descriptors, indexed by output stream index.
    pub fn outputs(&self) -> &[AvStream] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
