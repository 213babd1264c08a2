use std::sync::Mutex;

use serde::Serialize;

use crate::cursor::ThreadInfo;
use crate::string_pool::StringId;

/// Scheduler state of a thread leaving the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    New,
    Running,
    Suspended,
    Blocked,
    Dying,
    Dead,
    Unknown,
}

impl ThreadState {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => ThreadState::New,
            1 => ThreadState::Running,
            2 => ThreadState::Suspended,
            3 => ThreadState::Blocked,
            4 => ThreadState::Dying,
            5 => ThreadState::Dead,
            _ => ThreadState::Unknown,
        }
    }
}

/// Weight reported for idle threads.
pub const IDLE_WEIGHT: i32 = i32::MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextSwitch {
    pub ts: i64,
    pub cpu: u32,
    pub outgoing_state: ThreadState,
    pub outgoing: ThreadInfo,
    pub incoming: ThreadInfo,
    pub outgoing_is_idle: bool,
    pub incoming_is_idle: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThreadWakeup {
    pub ts: i64,
    pub cpu: u32,
    pub waking: ThreadInfo,
    pub is_idle: bool,
}

/// Scheduling records, delivered in stream order without passing the sorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedEvent {
    ContextSwitch(ContextSwitch),
    Wakeup(ThreadWakeup),
}

impl SchedEvent {
    pub fn ts(&self) -> i64 {
        match self {
            SchedEvent::ContextSwitch(s) => s.ts,
            SchedEvent::Wakeup(w) => w.ts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelObject {
    Process { pid: u64, name: StringId },
    Thread { tid: u64, pid: u64, name: StringId },
}

/// Receives records that are processed as soon as they are read.
pub trait ImmediateSink: Send + Sync {
    fn on_sched_event(&self, _event: SchedEvent) {}
    fn on_kernel_object(&self, _object: KernelObject) {}
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl ImmediateSink for NullSink {}

/// Keeps every record it receives, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sched: Mutex<Vec<SchedEvent>>,
    objects: Mutex<Vec<KernelObject>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sched_events(&self) -> Vec<SchedEvent> {
        self.sched.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn kernel_objects(&self) -> Vec<KernelObject> {
        self.objects.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl ImmediateSink for RecordingSink {
    fn on_sched_event(&self, event: SchedEvent) {
        if let Ok(mut sched) = self.sched.lock() {
            sched.push(event);
        }
    }

    fn on_kernel_object(&self, object: KernelObject) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.push(object);
        }
    }
}
