//! # Render Command Queue
//!
//! Double-buffered hand-off of draw lists from the simulation thread to the
//! render thread.
//!
//! ## Architecture
//!
//! ```text
//!   simulation thread                                render thread
//!  ┌──────────────────┐                            ┌──────────────────┐
//!  │ begin_frame()    │       ┌──────────────┐     │ wait_frame()     │
//!  │   FrameWriter ───┼──────►│  buffer A/B  │────►│   FrameGuard     │
//!  │ publish()        │       └──────────────┘     │ drop             │
//!  └──────┬───────────┘         frame_ready        └────────┬─────────┘
//!         │           ◄──────── render_done ◄───────────────┘
//! ```
//!
//! ## Buffer states
//!
//! - `Writable`: owned by a [`FrameWriter`]
//! - `Ready`: published and waiting for the render thread
//! - `Consuming`: owned by a [`FrameGuard`]
//! - `Idle`: free. May still hold a frame superseded before it was drawn.
//!
//! At most one buffer is `Ready`. Publishing demotes an older `Ready`
//! buffer to `Idle`, so the render thread always picks the newest frame.
//! A superseded frame is counted as stale when its buffer is reused.
//!
//! The producer blocks only when the buffer it must write next is being
//! consumed. Clearing the writable flag suspends both sides: the producer
//! stops acquiring buffers and the consumer returns
//! [`FrameWait::Suspended`].

use std::ops::Deref;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::command::{FrameMarker, QueuedCommand, RenderCommand};
use crate::error::{RenderError, RenderResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BufferState {
    Writable,
    Ready,
    Consuming,
    Idle,
}

/// Counters describing the queue's traffic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Frames handed to the render thread.
    pub frames_published: u64,
    /// Frames released by the render thread.
    pub frames_consumed: u64,
    /// Published frames overwritten before being drawn.
    pub stale_frames: u64,
    /// Times the producer blocked on the render thread.
    pub producer_waits: u64,
}

#[derive(Debug)]
struct QueueState {
    buffers: [Option<Vec<QueuedCommand>>; 2],
    states: [BufferState; 2],
    /// Published and not yet taken by the render thread.
    unconsumed: [bool; 2],
    write_index: usize,
    writable: bool,
    closed: bool,
    stats: QueueStats,
}

impl QueueState {
    fn ready_index(&self) -> Option<usize> {
        self.states.iter().position(|s| *s == BufferState::Ready)
    }

    fn release(&mut self, index: usize, mut buffer: Vec<QueuedCommand>) {
        buffer.clear();
        self.buffers[index] = Some(buffer);
        self.states[index] = BufferState::Idle;
    }
}

/// Double-buffered command queue shared by the simulation and render
/// threads.
#[derive(Debug)]
pub struct RenderQueue {
    state: Mutex<QueueState>,
    frame_ready: Condvar,
    render_done: Condvar,
}

/// Result of waiting for a frame.
#[derive(Debug)]
pub enum FrameWait<'a> {
    /// The newest published frame.
    Frame(FrameGuard<'a>),
    /// The queue is not writable; no frames will arrive until it is.
    Suspended,
    /// The queue was closed.
    Closed,
}

impl RenderQueue {
    /// Creates a queue whose buffers start with `capacity` entries each.
    #[must_use]
    pub fn with_capacity(capacity: usize, start_writable: bool) -> Self {
        Self {
            state: Mutex::new(QueueState {
                buffers: [
                    Some(Vec::with_capacity(capacity)),
                    Some(Vec::with_capacity(capacity)),
                ],
                states: [BufferState::Idle; 2],
                unconsumed: [false; 2],
                write_index: 0,
                writable: start_writable,
                closed: false,
                stats: QueueStats::default(),
            }),
            frame_ready: Condvar::new(),
            render_done: Condvar::new(),
        }
    }

    /// Acquires the next buffer for writing.
    ///
    /// Blocks while the render thread is drawing from that buffer. Returns
    /// `None` if the queue is suspended or closed, or if a writer is
    /// already open.
    pub fn begin_frame(&self) -> Option<FrameWriter<'_>> {
        let mut state = self.state.lock();
        let mut waited = false;
        loop {
            if !state.writable || state.closed {
                return None;
            }
            let index = state.write_index;
            match state.states[index] {
                BufferState::Consuming => {
                    if !waited {
                        state.stats.producer_waits += 1;
                        waited = true;
                    }
                    self.render_done.wait(&mut state);
                }
                BufferState::Writable => {
                    warn!("a frame is already being written");
                    return None;
                }
                BufferState::Ready | BufferState::Idle => break,
            }
        }

        let index = state.write_index;
        let mut buffer = state.buffers[index].take().unwrap_or_default();
        if std::mem::take(&mut state.unconsumed[index]) {
            state.stats.stale_frames += 1;
            warn!(
                commands = buffer.len(),
                "overwriting a frame the render thread never drew"
            );
        }
        buffer.clear();
        state.states[index] = BufferState::Writable;

        Some(FrameWriter {
            queue: self,
            index,
            buffer: Some(buffer),
        })
    }

    /// Blocks until a frame is published, the queue is suspended, or it is
    /// closed.
    pub fn wait_frame(&self) -> FrameWait<'_> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return FrameWait::Closed;
            }
            if !state.writable {
                return FrameWait::Suspended;
            }
            if let Some(index) = state.ready_index() {
                return FrameWait::Frame(self.take_ready(&mut state, index));
            }
            self.frame_ready.wait(&mut state);
        }
    }

    /// Takes the newest published frame without blocking.
    pub fn try_frame(&self) -> Option<FrameGuard<'_>> {
        let mut state = self.state.lock();
        if state.closed || !state.writable {
            return None;
        }
        let index = state.ready_index()?;
        Some(self.take_ready(&mut state, index))
    }

    fn take_ready(&self, state: &mut MutexGuard<'_, QueueState>, index: usize) -> FrameGuard<'_> {
        let buffer = state.buffers[index].take().unwrap_or_default();
        state.states[index] = BufferState::Consuming;
        state.unconsumed[index] = false;
        FrameGuard {
            queue: self,
            index,
            buffer,
        }
    }

    /// Blocks until the queue is writable again.
    ///
    /// Returns false if it was closed instead.
    pub fn wait_resumed(&self) -> bool {
        let mut state = self.state.lock();
        while !state.writable && !state.closed {
            self.frame_ready.wait(&mut state);
        }
        !state.closed
    }

    /// Suspends or resumes the queue, waking every waiting thread.
    pub fn set_writable(&self, writable: bool) {
        {
            let mut state = self.state.lock();
            if state.writable == writable {
                return;
            }
            state.writable = writable;
        }
        info!(writable, "render queue writability changed");
        self.frame_ready.notify_all();
        self.render_done.notify_all();
    }

    /// Returns true if frames can be written.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.state.lock().writable
    }

    /// Shuts the queue down. Both sides return immediately from then on.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        info!("render queue closed");
        self.frame_ready.notify_all();
        self.render_done.notify_all();
    }

    /// Returns true once [`RenderQueue::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Traffic counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.state.lock().stats
    }
}

/// Exclusive write access to one buffer.
///
/// Dropping the writer without publishing discards its commands.
#[derive(Debug)]
pub struct FrameWriter<'a> {
    queue: &'a RenderQueue,
    index: usize,
    buffer: Option<Vec<QueuedCommand>>,
}

impl FrameWriter<'_> {
    /// Appends one entry.
    pub fn push(&mut self, command: QueuedCommand) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.push(command);
        }
    }

    /// Appends a camera run: begin marker, draws, end marker.
    pub fn push_run(&mut self, marker: FrameMarker, draws: &[RenderCommand]) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.reserve(draws.len() + 2);
            buffer.push(QueuedCommand::BeginFrame(marker));
            buffer.extend(draws.iter().copied().map(QueuedCommand::Draw));
            buffer.push(QueuedCommand::EndFrame(marker.frame));
        }
    }

    /// Number of entries written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.as_ref().map_or(0, Vec::len)
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hands the frame to the render thread.
    ///
    /// Returns false if the queue was closed or suspended meanwhile and the
    /// frame was discarded.
    pub fn publish(mut self) -> bool {
        let Some(buffer) = self.buffer.take() else {
            return false;
        };
        let queue = self.queue;
        let index = self.index;

        let mut state = queue.state.lock();
        if state.closed || !state.writable {
            state.release(index, buffer);
            debug!(index, "discarded frame published while not writable");
            return false;
        }
        let commands = buffer.len();
        state.buffers[index] = Some(buffer);
        state.states[index] = BufferState::Ready;
        state.unconsumed[index] = true;
        let other = index ^ 1;
        if state.states[other] == BufferState::Ready {
            state.states[other] = BufferState::Idle;
        }
        state.write_index = other;
        state.stats.frames_published += 1;
        drop(state);

        debug!(index, commands, "published frame");
        queue.frame_ready.notify_all();
        true
    }
}

impl Extend<QueuedCommand> for FrameWriter<'_> {
    fn extend<I: IntoIterator<Item = QueuedCommand>>(&mut self, iter: I) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.extend(iter);
        }
    }
}

impl Drop for FrameWriter<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.queue.state.lock().release(self.index, buffer);
        }
    }
}

/// Read access to a published frame. Dropping it returns the buffer.
#[derive(Debug)]
pub struct FrameGuard<'a> {
    queue: &'a RenderQueue,
    index: usize,
    buffer: Vec<QueuedCommand>,
}

impl FrameGuard<'_> {
    /// Well-formed camera runs of the frame. Malformed entries are skipped
    /// with a warning.
    #[must_use]
    pub fn runs(&self) -> CameraRuns<'_> {
        CameraRuns::new(&self.buffer)
    }

    /// Checks the frame structure strictly.
    ///
    /// # Errors
    ///
    /// Returns the first structural error found.
    pub fn validate(&self) -> RenderResult<usize> {
        validate_frame(&self.buffer)
    }
}

impl Deref for FrameGuard<'_> {
    type Target = [QueuedCommand];

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        {
            let mut state = self.queue.state.lock();
            state.release(self.index, buffer);
            state.stats.frames_consumed += 1;
        }
        self.queue.render_done.notify_all();
    }
}

/// One camera's draws within a frame.
#[derive(Clone, Copy, Debug)]
pub struct CameraRun<'a> {
    /// Camera parameters.
    pub marker: FrameMarker,
    body: &'a [QueuedCommand],
}

impl<'a> CameraRun<'a> {
    /// Draws in submission order.
    pub fn draws(&self) -> impl Iterator<Item = &'a RenderCommand> + 'a {
        let body = self.body;
        body.iter().filter_map(|entry| match entry {
            QueuedCommand::Draw(command) => Some(command),
            _ => None,
        })
    }

    /// Number of draws.
    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Returns true if the camera saw nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Iterator over the camera runs of a frame.
#[derive(Clone, Debug)]
pub struct CameraRuns<'a> {
    entries: &'a [QueuedCommand],
    position: usize,
}

impl<'a> CameraRuns<'a> {
    /// Parses `entries` lazily.
    #[must_use]
    pub fn new(entries: &'a [QueuedCommand]) -> Self {
        Self {
            entries,
            position: 0,
        }
    }
}

impl<'a> Iterator for CameraRuns<'a> {
    type Item = CameraRun<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.entries.get(self.position..)?;
            let Some(offset) = rest
                .iter()
                .position(|e| matches!(e, QueuedCommand::BeginFrame(_)))
            else {
                if !rest.is_empty() {
                    warn!(entries = rest.len(), "skipping entries after the last camera run");
                }
                self.position = self.entries.len();
                return None;
            };
            if offset > 0 {
                warn!(entries = offset, "skipping entries outside a camera run");
            }

            let begin = self.position + offset;
            let QueuedCommand::BeginFrame(marker) = self.entries[begin] else {
                return None;
            };
            let body_start = begin + 1;
            let Some(length) = self.entries[body_start..]
                .iter()
                .position(|e| !matches!(e, QueuedCommand::Draw(_)))
            else {
                warn!(frame = marker.frame, "camera run is not terminated");
                self.position = self.entries.len();
                return None;
            };

            let end = body_start + length;
            match self.entries[end] {
                QueuedCommand::EndFrame(frame) if frame == marker.frame => {
                    self.position = end + 1;
                    return Some(CameraRun {
                        marker,
                        body: &self.entries[body_start..end],
                    });
                }
                QueuedCommand::EndFrame(frame) => {
                    warn!(begin = marker.frame, end = frame, "camera run markers disagree");
                    self.position = end + 1;
                }
                _ => {
                    warn!(frame = marker.frame, "camera run is not terminated");
                    self.position = end;
                }
            }
        }
    }
}

/// Checks that a frame is a sequence of well-formed camera runs.
///
/// Returns the number of runs.
///
/// # Errors
///
/// - [`RenderError::OrphanDraw`] for a draw outside a run
/// - [`RenderError::UnexpectedEnd`] for an end marker outside a run
/// - [`RenderError::MarkerMismatch`] if a run's markers disagree
/// - [`RenderError::UnterminatedRun`] if a run is never closed
pub fn validate_frame(entries: &[QueuedCommand]) -> RenderResult<usize> {
    let mut open: Option<u64> = None;
    let mut runs = 0;
    for (index, entry) in entries.iter().enumerate() {
        match (entry, open) {
            (QueuedCommand::BeginFrame(_), Some(frame)) => {
                return Err(RenderError::UnterminatedRun { frame });
            }
            (QueuedCommand::BeginFrame(marker), None) => open = Some(marker.frame),
            (QueuedCommand::Draw(_), None) => return Err(RenderError::OrphanDraw { index }),
            (QueuedCommand::Draw(_), Some(_)) => {}
            (QueuedCommand::EndFrame(_), None) => {
                return Err(RenderError::UnexpectedEnd { index });
            }
            (QueuedCommand::EndFrame(end), Some(begin)) => {
                if *end != begin {
                    return Err(RenderError::MarkerMismatch { begin, end: *end });
                }
                open = None;
                runs += 1;
            }
        }
    }
    match open {
        Some(frame) => Err(RenderError::UnterminatedRun { frame }),
        None => Ok(runs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::Vec2;

    fn marker(frame: u64) -> FrameMarker {
        FrameMarker {
            camera: 0,
            world_position: Vec2::ZERO,
            world_size: Vec2::new(10.0, 10.0),
            screen_position: Vec2::ZERO,
            screen_size: Vec2::ONE,
            mirror_y: false,
            frame,
        }
    }

    fn write_frame(queue: &RenderQueue, frame: u64, draws: usize) -> bool {
        let Some(mut writer) = queue.begin_frame() else {
            return false;
        };
        writer.push_run(marker(frame), &vec![RenderCommand::default(); draws]);
        writer.publish()
    }

    #[test]
    fn test_publish_then_consume() {
        let queue = RenderQueue::with_capacity(16, true);
        assert!(write_frame(&queue, 1, 3));

        let frame = queue.try_frame().unwrap();
        assert_eq!(frame.len(), 5);
        let runs: Vec<_> = frame.runs().collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].marker.frame, 1);
        assert_eq!(runs[0].draws().count(), 3);
        assert_eq!(frame.validate(), Ok(1));
        drop(frame);

        let stats = queue.stats();
        assert_eq!(stats.frames_published, 1);
        assert_eq!(stats.frames_consumed, 1);
        assert!(queue.try_frame().is_none());
    }

    #[test]
    fn test_newest_frame_wins_and_stale_is_counted() {
        let queue = RenderQueue::with_capacity(16, true);
        assert!(write_frame(&queue, 1, 1));
        assert!(write_frame(&queue, 2, 1));

        let frame = queue.try_frame().unwrap();
        assert_eq!(frame.runs().next().unwrap().marker.frame, 2);
        drop(frame);
        assert_eq!(queue.stats().stale_frames, 0);

        // Frame 1's buffer is reused now
        assert!(write_frame(&queue, 3, 1));
        assert_eq!(queue.stats().stale_frames, 1);
    }

    #[test]
    fn test_suspended_queue_rejects_both_sides() {
        let queue = RenderQueue::with_capacity(4, false);
        assert!(queue.begin_frame().is_none());
        assert!(matches!(queue.wait_frame(), FrameWait::Suspended));

        queue.set_writable(true);
        assert!(write_frame(&queue, 1, 0));
        assert!(matches!(queue.wait_frame(), FrameWait::Frame(_)));
    }

    #[test]
    fn test_stale_empty_frames_are_counted() {
        let queue = RenderQueue::with_capacity(4, true);
        for frame in 1..=4 {
            let writer = queue.begin_frame().unwrap();
            assert!(writer.is_empty());
            assert!(writer.publish());
            assert_eq!(queue.stats().frames_published, frame);
        }
        // Frames 1 and 2 were overwritten without being drawn
        assert_eq!(queue.stats().stale_frames, 2);

        drop(queue.try_frame().unwrap());
        assert!(write_frame(&queue, 5, 0));
        assert!(write_frame(&queue, 6, 0));
        assert_eq!(queue.stats().stale_frames, 3);
    }

    #[test]
    fn test_publish_after_suspend_is_discarded() {
        let queue = RenderQueue::with_capacity(4, true);
        let mut writer = queue.begin_frame().unwrap();
        writer.push_run(marker(1), &[RenderCommand::default()]);
        queue.set_writable(false);
        assert!(!writer.publish());
        assert_eq!(queue.stats().frames_published, 0);

        queue.set_writable(true);
        assert!(queue.try_frame().is_none());
        assert!(write_frame(&queue, 2, 1));
        let frame = queue.try_frame().unwrap();
        assert_eq!(frame.runs().next().unwrap().marker.frame, 2);
        drop(frame);
        assert_eq!(queue.stats().stale_frames, 0);
    }

    #[test]
    fn test_closed_queue() {
        let queue = RenderQueue::with_capacity(4, true);
        let mut writer = queue.begin_frame().unwrap();
        writer.push(QueuedCommand::EndFrame(0));
        queue.close();
        assert!(!writer.publish());
        assert!(matches!(queue.wait_frame(), FrameWait::Closed));
        assert!(!queue.wait_resumed());
        assert!(queue.begin_frame().is_none());
    }

    #[test]
    fn test_dropped_writer_discards_commands() {
        let queue = RenderQueue::with_capacity(4, true);
        {
            let mut writer = queue.begin_frame().unwrap();
            writer.push_run(marker(1), &[RenderCommand::default()]);
            assert_eq!(writer.len(), 3);
        }
        assert!(queue.try_frame().is_none());
        assert!(write_frame(&queue, 2, 0));
        assert_eq!(queue.stats().stale_frames, 0);
    }

    #[test]
    fn test_second_writer_is_refused() {
        let queue = RenderQueue::with_capacity(4, true);
        let _writer = queue.begin_frame().unwrap();
        assert!(queue.begin_frame().is_none());
    }

    #[test]
    fn test_runs_skip_malformed_entries() {
        let draw = QueuedCommand::Draw(RenderCommand::default());
        let entries = vec![
            draw,
            QueuedCommand::BeginFrame(marker(4)),
            draw,
            QueuedCommand::EndFrame(5),
            QueuedCommand::BeginFrame(marker(6)),
            QueuedCommand::BeginFrame(marker(6)),
            draw,
            draw,
            QueuedCommand::EndFrame(6),
            QueuedCommand::BeginFrame(marker(7)),
        ];
        let runs: Vec<_> = CameraRuns::new(&entries).collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].marker.frame, 6);
        assert_eq!(runs[0].len(), 2);

        assert_eq!(
            validate_frame(&entries),
            Err(RenderError::OrphanDraw { index: 0 })
        );
        assert_eq!(
            validate_frame(&entries[1..4]),
            Err(RenderError::MarkerMismatch { begin: 4, end: 5 })
        );
        assert_eq!(
            validate_frame(&entries[9..]),
            Err(RenderError::UnterminatedRun { frame: 7 })
        );
        assert_eq!(
            validate_frame(&entries[3..4]),
            Err(RenderError::UnexpectedEnd { index: 0 })
        );
    }
}
