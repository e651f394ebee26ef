use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    error::{Error, Result},
    header::CompositeType,
};

/// What the validator has to read next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Next {
    /// A complete value.
    Value,
    /// A KeyValue-typed key for the innermost open map.
    MapKey,
    /// A continuation header for the innermost open container.
    Continuation(CompositeType),
}

#[derive(Clone, Debug)]
enum FrameKind {
    KeyValue,
    Sequence,
    Map {
        awaiting_value: bool,
        /// Only kept when duplicate keys are rejected.
        keys: Option<BTreeSet<Vec<u8>>>,
    },
}

#[derive(Clone, Debug)]
struct Frame {
    kind: FrameKind,
    /// Elements or entries left in the current chunk.
    remaining: usize,
    terminated: bool,
}

/// Explicit stack of the containers open around the validator's read position.
#[derive(Clone, Debug)]
pub(crate) struct DepthTracker {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl DepthTracker {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Open a KeyValue whose key has been read; its nested value comes next.
    pub fn open_key_value(&mut self) -> Result<()> {
        self.push(Frame {
            kind: FrameKind::KeyValue,
            remaining: 1,
            terminated: true,
        })
    }

    pub fn open_sequence(&mut self, size: usize, terminated: bool) -> Result<()> {
        self.push(Frame {
            kind: FrameKind::Sequence,
            remaining: size,
            terminated,
        })
    }

    pub fn open_map(&mut self, size: usize, terminated: bool, track_keys: bool) -> Result<()> {
        self.push(Frame {
            kind: FrameKind::Map {
                awaiting_value: false,
                keys: if track_keys { Some(BTreeSet::new()) } else { None },
            },
            remaining: size,
            terminated,
        })
    }

    fn push(&mut self, frame: Frame) -> Result<()> {
        self.frames.push(frame);
        if self.frames.len() > self.max_depth {
            debug!(
                max_depth = self.max_depth,
                "rejecting value: nesting too deep"
            );
            return Err(Error::ParseLimit(format!(
                "nesting deeper than {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    /// Record a finished scalar value: a Bytes value, or a container that has just closed.
    pub fn value_done(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.remaining -= 1;
            if let FrameKind::Map { awaiting_value, .. } = &mut frame.kind {
                *awaiting_value = false;
            }
        }
    }

    /// Record the key of the next entry in the innermost map. Returns false if the key was
    /// already present and keys are being tracked.
    pub fn map_key(&mut self, key: Option<Vec<u8>>) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return true;
        };
        let FrameKind::Map {
            awaiting_value,
            keys,
        } = &mut frame.kind
        else {
            return true;
        };
        *awaiting_value = true;
        match (keys, key) {
            (Some(keys), Some(key)) => keys.insert(key),
            _ => true,
        }
    }

    /// Whether the innermost map wants its keys retained.
    pub fn tracks_keys(&self) -> bool {
        matches!(
            self.frames.last(),
            Some(Frame {
                kind: FrameKind::Map { keys: Some(_), .. },
                ..
            })
        )
    }

    /// Start the next chunk of the innermost container.
    pub fn continue_chunk(&mut self, size: usize, terminated: bool) {
        if let Some(frame) = self.frames.last_mut() {
            frame.remaining = size;
            frame.terminated = terminated;
        }
    }

    /// Work out what to read next, closing any containers that are complete. `None` means the
    /// top-level value is finished.
    pub fn next(&mut self) -> Option<Next> {
        loop {
            let frame = self.frames.last()?;
            let next = match frame.kind {
                FrameKind::Map {
                    awaiting_value: true,
                    ..
                } => Some(Next::Value),
                FrameKind::Map { .. } if frame.remaining > 0 => Some(Next::MapKey),
                _ if frame.remaining > 0 => Some(Next::Value),
                FrameKind::Sequence if !frame.terminated => {
                    Some(Next::Continuation(CompositeType::Sequence))
                }
                FrameKind::Map { .. } if !frame.terminated => {
                    Some(Next::Continuation(CompositeType::Map))
                }
                _ => None,
            };
            if next.is_some() {
                return next;
            }
            self.frames.pop();
            self.value_done();
        }
    }
}
