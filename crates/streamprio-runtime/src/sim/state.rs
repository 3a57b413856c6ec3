//! Scheduling state of the simulated device.
//!
//! Everything in here runs under the device mutex. Workers call
//! [`DeviceState::claim`] to take the next work unit and
//! [`DeviceState::complete`] when they are done with it; host calls submit
//! commands and inspect completion.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use crate::buffer::{DeviceBuffer, HostBuffer};
use crate::error::{Result, RuntimeError};
use crate::event::EventId;
use crate::kernel::KernelLaunch;
use crate::priority::PriorityRange;
use crate::queue::{QueueFlags, QueueId};

/// One queued operation.
#[derive(Debug)]
pub(crate) enum Op {
    CopyToDevice { dst: DeviceBuffer, src: HostBuffer },
    CopyToHost { dst: HostBuffer, src: DeviceBuffer },
    Kernel(KernelLaunch),
    /// Zero-unit marker; completes the moment it reaches the queue head.
    Record(EventId),
}

impl Op {
    fn execute_unit(&self, unit: u32, units: u32) {
        match self {
            Self::CopyToDevice { dst, src } => dst.copy_from_host(src),
            Self::CopyToHost { dst, src } => dst.copy_from_device(src),
            Self::Kernel(launch) => launch.run_unit(unit, units),
            Self::Record(_) => {}
        }
    }
}

#[derive(Debug)]
struct Command {
    seq: u64,
    op: Arc<Op>,
    units: u32,
}

#[derive(Debug)]
struct ActiveCommand {
    seq: u64,
    op: Arc<Op>,
    units: u32,
    next_unit: u32,
    done: u32,
}

#[derive(Debug)]
pub(crate) struct QueueState {
    pub(crate) priority: i32,
    pub(crate) flags: QueueFlags,
    rank: u32,
    pending: VecDeque<Command>,
    active: Option<ActiveCommand>,
    last_served: u64,
}

impl QueueState {
    fn new(priority: i32, flags: QueueFlags, rank: u32) -> Self {
        Self { priority, flags, rank, pending: VecDeque::new(), active: None, last_served: 0 }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }

    /// Sequence number of the oldest command not yet completed.
    fn oldest_seq(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.seq).or_else(|| self.pending.front().map(|c| c.seq))
    }

    fn is_blocking(&self) -> bool {
        !self.flags.is_non_blocking()
    }
}

#[derive(Debug, Default)]
struct EventState {
    /// Records submitted but not yet reached.
    in_flight: u32,
    completed_at: Option<Instant>,
}

/// A claimed slice of an active command, executed outside the lock.
#[derive(Debug)]
pub(crate) struct WorkUnit {
    pub(crate) queue: QueueId,
    seq: u64,
    op: Arc<Op>,
    index: u32,
    units: u32,
}

impl WorkUnit {
    pub(crate) fn execute(&self) {
        self.op.execute_unit(self.index, self.units);
    }
}

#[derive(Debug)]
pub(crate) struct DeviceState {
    range: PriorityRange,
    queues: BTreeMap<QueueId, QueueState>,
    events: HashMap<EventId, EventState>,
    next_queue: u64,
    next_event: u64,
    next_seq: u64,
    serve_tick: u64,
    pub(crate) shutdown: bool,
}

impl DeviceState {
    /// Fresh state holding only the default queue, bound to `range.low`.
    pub(crate) fn new(range: PriorityRange) -> Self {
        let mut queues = BTreeMap::new();
        queues.insert(QueueId::DEFAULT, QueueState::new(range.low, QueueFlags::DEFAULT, range.rank(range.low)));
        Self {
            range,
            queues,
            events: HashMap::new(),
            next_queue: 1,
            next_event: 1,
            next_seq: 1,
            serve_tick: 0,
            shutdown: false,
        }
    }

    pub(crate) fn create_queue(&mut self, flags: QueueFlags, priority: i32) -> (QueueId, i32) {
        let priority = self.range.clamp(priority);
        let id = QueueId(self.next_queue);
        self.next_queue += 1;
        self.queues.insert(id, QueueState::new(priority, flags, self.range.rank(priority)));
        (id, priority)
    }

    /// Remove an idle, non-default queue.
    pub(crate) fn remove_queue(&mut self, id: QueueId) -> Result<()> {
        if id.is_default() {
            return Err(invalid_queue(id));
        }
        match self.queues.get(&id) {
            Some(q) if q.is_idle() => {
                self.queues.remove(&id);
                Ok(())
            }
            Some(_) => Err(RuntimeError::NotReady(format!("{id} still has outstanding work"))),
            None => Err(invalid_queue(id)),
        }
    }

    pub(crate) fn queue(&self, id: QueueId) -> Result<&QueueState> {
        self.queues.get(&id).ok_or_else(|| invalid_queue(id))
    }

    /// Queues created by the host, excluding the default queue.
    pub(crate) fn live_queue_count(&self) -> usize {
        self.queues.len() - 1
    }

    pub(crate) fn all_idle(&self) -> bool {
        self.queues.values().all(QueueState::is_idle)
    }

    /// Append a command to `queue`. `units` is the number of work units it
    /// splits into (0 only for event records).
    pub(crate) fn submit(&mut self, queue: QueueId, op: Op, units: u32) -> Result<()> {
        if !self.queues.contains_key(&queue) {
            return Err(invalid_queue(queue));
        }
        if let Op::Record(event) = &op {
            self.events.get_mut(event).ok_or_else(|| invalid_event(*event))?.in_flight += 1;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(q) = self.queues.get_mut(&queue) {
            q.pending.push_back(Command { seq, op: Arc::new(op), units });
        }
        self.advance();
        Ok(())
    }

    pub(crate) fn create_event(&mut self) -> EventId {
        let id = EventId(self.next_event);
        self.next_event += 1;
        self.events.insert(id, EventState::default());
        id
    }

    pub(crate) fn destroy_event(&mut self, id: EventId) -> Result<()> {
        self.events.remove(&id).map(|_| ()).ok_or_else(|| invalid_event(id))
    }

    /// `true` while a record of `id` is still queued.
    pub(crate) fn event_pending(&self, id: EventId) -> Result<bool> {
        Ok(self.events.get(&id).ok_or_else(|| invalid_event(id))?.in_flight > 0)
    }

    pub(crate) fn elapsed_ms(&self, start: EventId, end: EventId) -> Result<f32> {
        let at = |id: EventId| -> Result<Instant> {
            let event = self.events.get(&id).ok_or_else(|| invalid_event(id))?;
            if event.in_flight > 0 {
                return Err(RuntimeError::NotReady(format!("{id} has not completed")));
            }
            event.completed_at.ok_or_else(|| RuntimeError::NotReady(format!("{id} was never recorded")))
        };
        let (start, end) = (at(start)?, at(end)?);
        let ms = if end >= start {
            end.duration_since(start).as_secs_f64() * 1e3
        } else {
            -(start.duration_since(end).as_secs_f64() * 1e3)
        };
        Ok(ms as f32)
    }

    /// Take the next work unit: the most urgent queue with unclaimed units
    /// wins, ties go to the queue served least recently.
    pub(crate) fn claim(&mut self) -> Option<WorkUnit> {
        let id = self
            .queues
            .iter()
            .filter(|(_, q)| q.active.as_ref().is_some_and(|a| a.next_unit < a.units))
            .min_by_key(|(_, q)| (q.rank, q.last_served))
            .map(|(id, _)| *id)?;
        self.serve_tick += 1;
        let q = self.queues.get_mut(&id)?;
        q.last_served = self.serve_tick;
        let active = q.active.as_mut()?;
        let index = active.next_unit;
        active.next_unit += 1;
        Some(WorkUnit { queue: id, seq: active.seq, op: Arc::clone(&active.op), index, units: active.units })
    }

    /// Mark `unit` finished and promote whatever it unblocks.
    pub(crate) fn complete(&mut self, unit: &WorkUnit) {
        let Some(q) = self.queues.get_mut(&unit.queue) else {
            return;
        };
        let finished = match q.active.as_mut() {
            Some(active) if active.seq == unit.seq => {
                active.done += 1;
                active.done >= active.units
            }
            _ => false,
        };
        if finished {
            q.active = None;
            self.advance();
        }
    }

    /// Promote queue heads to active until nothing else can move.
    fn advance(&mut self) {
        loop {
            let ready: Vec<QueueId> =
                self.queues.iter().filter(|(id, _)| self.head_ready(**id)).map(|(id, _)| *id).collect();
            if ready.is_empty() {
                return;
            }
            for id in ready {
                self.promote(id);
            }
        }
    }

    /// The head of `id` may start: the queue is not busy and no earlier
    /// command it is ordered behind is outstanding.
    ///
    /// The default queue is ordered after every earlier command on blocking
    /// queues and vice versa. Non-blocking queues are ordered only within
    /// themselves.
    fn head_ready(&self, id: QueueId) -> bool {
        let Some(q) = self.queues.get(&id) else {
            return false;
        };
        let Some(head) = q.pending.front() else {
            return false;
        };
        if q.active.is_some() {
            return false;
        }
        let earlier = |other: &QueueState| other.oldest_seq().is_some_and(|seq| seq < head.seq);
        if id.is_default() {
            !self.queues.iter().any(|(other_id, other)| !other_id.is_default() && other.is_blocking() && earlier(other))
        } else if q.is_blocking() {
            !self.queues.get(&QueueId::DEFAULT).is_some_and(earlier)
        } else {
            true
        }
    }

    fn promote(&mut self, id: QueueId) {
        let Some(q) = self.queues.get_mut(&id) else {
            return;
        };
        let Some(cmd) = q.pending.pop_front() else {
            return;
        };
        if cmd.units > 0 {
            q.active = Some(ActiveCommand { seq: cmd.seq, op: cmd.op, units: cmd.units, next_unit: 0, done: 0 });
            return;
        }
        if let Op::Record(event) = &*cmd.op
            && let Some(state) = self.events.get_mut(event)
        {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.completed_at = Some(Instant::now());
        }
    }
}

fn invalid_queue(id: QueueId) -> RuntimeError {
    RuntimeError::InvalidHandle { kind: "queue", id: id.0 }
}

fn invalid_event(id: EventId) -> RuntimeError {
    RuntimeError::InvalidHandle { kind: "event", id: id.0 }
}
