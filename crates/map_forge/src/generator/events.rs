//! Event types and sinks for observing map generation.
//!
//! [`MapGenerator::generate_with_events`](crate::generator::MapGenerator::generate_with_events)
//! reports progress through an [`EventSink`]. Sinks can collect events, forward them to a
//! closure, fan them out to several other sinks, or drop them.
use crate::stages::StageKind;

/// Describes events emitted while generating a map.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Emitted before any stage is built.
    GenerationStarted {
        seed: u64,
        width: usize,
        height: usize,
    },

    /// Emitted after a stage registered its vertices with the pipeline.
    StageScheduled {
        stage: StageKind,
        /// Entries declared by this stage.
        entries: usize,
    },

    /// Emitted when the pipeline switches to its running phase.
    PipelineStarted {
        /// Total entries declared across all stages.
        entries: usize,
    },

    /// Emitted once every entry completed.
    PipelineFinished { entries: usize },

    /// Emitted when a stage read its outputs back from the pipeline.
    StageFinalized {
        stage: StageKind,
        /// Output endpoint names, sorted.
        outputs: Vec<String>,
    },

    /// Non-fatal warning, such as a determinism warning from the pipeline.
    Warning {
        /// Context string (e.g. stage name or mask name).
        context: String,
        /// Human-readable message.
        message: String,
    },

    /// Emitted when the artifact is assembled.
    GenerationFinished {
        seed: u64,
        /// Hex-encoded content hash of the artifact.
        content_hash: String,
        entries: usize,
    },
}

/// Discriminant of [`GenerationEvent`], used by sinks to filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationEventKind {
    GenerationStarted,
    StageScheduled,
    PipelineStarted,
    PipelineFinished,
    StageFinalized,
    Warning,
    GenerationFinished,
}

impl GenerationEvent {
    pub fn kind(&self) -> GenerationEventKind {
        match self {
            GenerationEvent::GenerationStarted { .. } => GenerationEventKind::GenerationStarted,
            GenerationEvent::StageScheduled { .. } => GenerationEventKind::StageScheduled,
            GenerationEvent::PipelineStarted { .. } => GenerationEventKind::PipelineStarted,
            GenerationEvent::PipelineFinished { .. } => GenerationEventKind::PipelineFinished,
            GenerationEvent::StageFinalized { .. } => GenerationEventKind::StageFinalized,
            GenerationEvent::Warning { .. } => GenerationEventKind::Warning,
            GenerationEvent::GenerationFinished { .. } => GenerationEventKind::GenerationFinished,
        }
    }
}

/// A generic event sink that accepts [`GenerationEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: GenerationEvent);

    /// Whether events of `kind` should be built and sent at all.
    #[inline]
    fn wants(&self, _kind: GenerationEventKind) -> bool {
        true
    }

    fn send_many<I>(&mut self, events: I)
    where
        Self: Sized,
        I: IntoIterator<Item = GenerationEvent>,
    {
        for e in events {
            self.send(e);
        }
    }
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: GenerationEvent) {}

    #[inline]
    fn wants(&self, _kind: GenerationEventKind) -> bool {
        false
    }
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(GenerationEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(GenerationEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(GenerationEvent),
{
    #[inline]
    fn send(&mut self, event: GenerationEvent) {
        (self.f)(event);
    }
}

/// An event sink that collects all events in a `Vec`.
#[derive(Default)]
pub struct VecSink {
    events: Vec<GenerationEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            events: Vec::with_capacity(cap),
        }
    }

    pub fn into_inner(self) -> Vec<GenerationEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[GenerationEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Collected events of one kind, in emission order.
    pub fn of_kind(&self, kind: GenerationEventKind) -> Vec<&GenerationEvent> {
        self.events.iter().filter(|e| e.kind() == kind).collect()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: GenerationEvent) {
        self.events.push(event);
    }
}

/// Fan-out sink that forwards each event to all contained sinks.
pub struct MultiSink<S: EventSink> {
    pub(crate) sinks: Vec<S>,
}

impl<S: EventSink> MultiSink<S> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sinks(sinks: Vec<S>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: S) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn into_inner(self) -> Vec<S> {
        self.sinks
    }
}

impl<S: EventSink> Default for MultiSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> EventSink for MultiSink<S> {
    fn send(&mut self, event: GenerationEvent) {
        let Some((last, rest)) = self.sinks.split_last_mut() else {
            return;
        };
        for sink in rest {
            if sink.wants(event.kind()) {
                sink.send(event.clone());
            }
        }
        if last.wants(event.kind()) {
            last.send(event);
        }
    }

    fn wants(&self, kind: GenerationEventKind) -> bool {
        self.sinks.iter().any(|s| s.wants(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(context: &str) -> GenerationEvent {
        GenerationEvent::Warning {
            context: context.into(),
            message: "msg".into(),
        }
    }

    #[test]
    fn vec_sink_collects_events() {
        let mut sink = VecSink::with_capacity(2);
        assert!(sink.is_empty());
        sink.send(warning("a"));
        sink.send(GenerationEvent::PipelineStarted { entries: 3 });
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.of_kind(GenerationEventKind::Warning).len(), 1);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn multi_sink_fans_out_events() {
        let mut multi = MultiSink::with_sinks(vec![VecSink::new(), VecSink::new()]);
        multi.send(warning("ctx"));
        assert_eq!(multi.len(), 2);
        for sink in multi.into_inner() {
            assert_eq!(sink.as_slice(), &[warning("ctx")]);
        }
    }

    #[test]
    fn empty_multi_sink_wants_nothing() {
        let mut multi: MultiSink<VecSink> = MultiSink::default();
        assert!(!multi.wants(GenerationEventKind::Warning));
        multi.send(warning("dropped"));
        assert!(multi.is_empty());
    }

    #[test]
    fn fn_sink_invokes_callback() {
        let mut count = 0;
        let mut sink = FnSink::new(|_event| {
            count += 1;
        });
        sink.send_many(vec![warning("a"), warning("b")]);
        assert_eq!(count, 2);
    }

    #[test]
    fn unit_sink_declines_every_kind() {
        assert!(!().wants(GenerationEventKind::GenerationFinished));
    }
}
