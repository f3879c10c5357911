//! The event enums.
//!
//! A protocol operation that needs a lock is split into stages, exactly one
//! stage per CPU run: the entry handler calls `lock_acquire` with a `*Locked`
//! continuation event, the `*Locked` handler mutates the guarded state and
//! calls `lock_release` with an `*Unlocked` continuation, and the
//! `*Unlocked` handler finishes up outside the critical section. Heavy
//! continuations carry a slot id into the engine's in-flight record arena
//! instead of the full payload.

use rainsim_messages::{scalar, vector};

/// Identifies one of a node's CPU locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockId(pub u32);

/// Identifies one of a node's CPU read-write locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RwLockId(pub u32);

/// Anything a node can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A run's accrued service time has elapsed; the core is free again.
    FreeCore,
    /// A core was freed without a `FreeCore` event (a run suspended on a
    /// lock); start the next queued event if any.
    RunQueued,
    /// Periodic CPU queue-depth sample.
    CpuStatsTick,
    /// Suspended run asking for a lock; `cont` resumes it under the lock.
    LockAcquire { lock: LockId, cont: Box<Event> },
    /// Suspended run releasing a lock; `cont` resumes it outside the lock
    /// (`None` means the run is finished).
    LockRelease { lock: LockId, cont: Option<Box<Event>> },
    RwReadAcquire { lock: RwLockId, cont: Box<Event> },
    RwReadRelease { lock: RwLockId, cont: Option<Box<Event>> },
    RwWriteAcquire { lock: RwLockId, cont: Box<Event> },
    RwWriteRelease { lock: RwLockId, cont: Option<Box<Event>> },
    Scalar(ScalarEvent),
    Vector(VectorEvent),
}

impl Event {
    /// CPU-substrate events are consumed by the CPU itself and never reach
    /// a protocol engine.
    pub fn is_cpu_control(&self) -> bool {
        !matches!(self, Event::Scalar(_) | Event::Vector(_))
    }

    /// Lock round-trip events claim the core slot their suspended run left
    /// behind, so they bypass the ready queue.
    pub fn is_lock_op(&self) -> bool {
        matches!(
            self,
            Event::LockAcquire { .. }
                | Event::LockRelease { .. }
                | Event::RwReadAcquire { .. }
                | Event::RwReadRelease { .. }
                | Event::RwWriteAcquire { .. }
                | Event::RwWriteRelease { .. }
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Event::FreeCore => "FreeCore",
            Event::RunQueued => "RunQueued",
            Event::CpuStatsTick => "CpuStatsTick",
            Event::LockAcquire { .. } => "LockAcquire",
            Event::LockRelease { .. } => "LockRelease",
            Event::RwReadAcquire { .. } => "RwReadAcquire",
            Event::RwReadRelease { .. } => "RwReadRelease",
            Event::RwWriteAcquire { .. } => "RwWriteAcquire",
            Event::RwWriteRelease { .. } => "RwWriteRelease",
            Event::Scalar(event) => event.type_name(),
            Event::Vector(event) => event.type_name(),
        }
    }
}

/// Events of the scalar-GST protocol variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarEvent {
    GetRequest(scalar::GetRequest),
    /// Proxy folding a forwarded request's GST into its own, under lock.
    ForwardedGetLocked(scalar::GetRequest),
    GetLocked { slot: u32 },
    GetUnlocked { slot: u32 },
    GetResponse(scalar::GetResponse),
    PutRequest(scalar::PutRequest),
    PutLocked { slot: u32 },
    PutUnlocked { slot: u32 },
    PutResponse(scalar::PutResponse),
    ReplicaUpdate(scalar::ReplicaUpdate),
    ReplicaUpdateLocked(scalar::ReplicaUpdate),
    ReplicaUpdateUnlocked(scalar::ReplicaUpdate),
    Heartbeat(scalar::Heartbeat),
    HeartbeatLocked(scalar::Heartbeat),
    ClockTick,
    ClockTickLocked,
    ClockTickUnlocked { send_time: bool },
    StartGstRound,
    LstFromLeaf(scalar::LstFromLeaf),
    LstRootLocked,
    LstRootUnlocked,
    GstFromRoot(scalar::GstFromRoot),
    GstFromRootLocked(scalar::GstFromRoot),
    GstFromRootUnlocked(scalar::GstFromRoot),
    SnapshotRequest(scalar::SnapshotRequest),
    SnapshotLocked { slot: u32 },
    SnapshotUnlocked { slot: u32 },
    SnapshotResponse(scalar::SnapshotResponse),
    SliceRequest(scalar::SliceRequest),
    SliceRequestLocked(scalar::SliceRequest),
    SliceRequestUnlocked(scalar::SliceRequest),
    SliceResponse(scalar::SliceResponse),
    SliceResponseLocked(scalar::SliceResponse),
    SliceResponseUnlocked(scalar::SliceResponse),
    RotxRequest(scalar::RotxRequest),
    /// Client-bound; servers never handle it.
    RotxResponse(scalar::RotxResponse),
}

impl ScalarEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarEvent::GetRequest(_) => "Scalar::GetRequest",
            ScalarEvent::ForwardedGetLocked(_) => "Scalar::ForwardedGetLocked",
            ScalarEvent::GetLocked { .. } => "Scalar::GetLocked",
            ScalarEvent::GetUnlocked { .. } => "Scalar::GetUnlocked",
            ScalarEvent::GetResponse(_) => "Scalar::GetResponse",
            ScalarEvent::PutRequest(_) => "Scalar::PutRequest",
            ScalarEvent::PutLocked { .. } => "Scalar::PutLocked",
            ScalarEvent::PutUnlocked { .. } => "Scalar::PutUnlocked",
            ScalarEvent::PutResponse(_) => "Scalar::PutResponse",
            ScalarEvent::ReplicaUpdate(_) => "Scalar::ReplicaUpdate",
            ScalarEvent::ReplicaUpdateLocked(_) => "Scalar::ReplicaUpdateLocked",
            ScalarEvent::ReplicaUpdateUnlocked(_) => "Scalar::ReplicaUpdateUnlocked",
            ScalarEvent::Heartbeat(_) => "Scalar::Heartbeat",
            ScalarEvent::HeartbeatLocked(_) => "Scalar::HeartbeatLocked",
            ScalarEvent::ClockTick => "Scalar::ClockTick",
            ScalarEvent::ClockTickLocked => "Scalar::ClockTickLocked",
            ScalarEvent::ClockTickUnlocked { .. } => "Scalar::ClockTickUnlocked",
            ScalarEvent::StartGstRound => "Scalar::StartGstRound",
            ScalarEvent::LstFromLeaf(_) => "Scalar::LstFromLeaf",
            ScalarEvent::LstRootLocked => "Scalar::LstRootLocked",
            ScalarEvent::LstRootUnlocked => "Scalar::LstRootUnlocked",
            ScalarEvent::GstFromRoot(_) => "Scalar::GstFromRoot",
            ScalarEvent::GstFromRootLocked(_) => "Scalar::GstFromRootLocked",
            ScalarEvent::GstFromRootUnlocked(_) => "Scalar::GstFromRootUnlocked",
            ScalarEvent::SnapshotRequest(_) => "Scalar::SnapshotRequest",
            ScalarEvent::SnapshotLocked { .. } => "Scalar::SnapshotLocked",
            ScalarEvent::SnapshotUnlocked { .. } => "Scalar::SnapshotUnlocked",
            ScalarEvent::SnapshotResponse(_) => "Scalar::SnapshotResponse",
            ScalarEvent::SliceRequest(_) => "Scalar::SliceRequest",
            ScalarEvent::SliceRequestLocked(_) => "Scalar::SliceRequestLocked",
            ScalarEvent::SliceRequestUnlocked(_) => "Scalar::SliceRequestUnlocked",
            ScalarEvent::SliceResponse(_) => "Scalar::SliceResponse",
            ScalarEvent::SliceResponseLocked(_) => "Scalar::SliceResponseLocked",
            ScalarEvent::SliceResponseUnlocked(_) => "Scalar::SliceResponseUnlocked",
            ScalarEvent::RotxRequest(_) => "Scalar::RotxRequest",
            ScalarEvent::RotxResponse(_) => "Scalar::RotxResponse",
        }
    }
}

/// Events of the vector-GST protocol variant.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorEvent {
    GetRequest(vector::GetRequest),
    ForwardedGetLocked(vector::GetRequest),
    GetLocked(vector::GetRequest),
    GetUnlocked(vector::GetRequest),
    GetResponse(vector::GetResponse),
    PutRequest(vector::PutRequest),
    PutLocked { slot: u32 },
    PutUnlocked { slot: u32 },
    PutResponse(vector::PutResponse),
    ReplicaUpdate(vector::ReplicaUpdate),
    ReplicaUpdateLocked(vector::ReplicaUpdate),
    ReplicaUpdateUnlocked(vector::ReplicaUpdate),
    Heartbeat(vector::Heartbeat),
    HeartbeatLocked(vector::Heartbeat),
    ClockTick,
    ClockTickLocked,
    ClockTickUnlocked { send_time: bool },
    StartGstRound,
    LstFromLeaf(vector::LstFromLeaf),
    LstRootLocked,
    LstRootUnlocked,
    GstFromRoot(vector::GstFromRoot),
    GstFromRootLocked(vector::GstFromRoot),
    GstFromRootUnlocked,
    SliceRequest(vector::SliceRequest),
    SliceRequestLocked(vector::SliceRequest),
    SliceRequestUnlocked(vector::SliceRequest),
    SliceResponse(vector::SliceResponse),
    RotxRequest(vector::RotxRequest),
    RotxRequestLocked(vector::RotxRequest),
    RotxRequestUnlocked(vector::RotxRequest),
    /// Client-bound; servers never handle it.
    RotxResponse(vector::RotxResponse),
}

impl VectorEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            VectorEvent::GetRequest(_) => "Vector::GetRequest",
            VectorEvent::ForwardedGetLocked(_) => "Vector::ForwardedGetLocked",
            VectorEvent::GetLocked(_) => "Vector::GetLocked",
            VectorEvent::GetUnlocked(_) => "Vector::GetUnlocked",
            VectorEvent::GetResponse(_) => "Vector::GetResponse",
            VectorEvent::PutRequest(_) => "Vector::PutRequest",
            VectorEvent::PutLocked { .. } => "Vector::PutLocked",
            VectorEvent::PutUnlocked { .. } => "Vector::PutUnlocked",
            VectorEvent::PutResponse(_) => "Vector::PutResponse",
            VectorEvent::ReplicaUpdate(_) => "Vector::ReplicaUpdate",
            VectorEvent::ReplicaUpdateLocked(_) => "Vector::ReplicaUpdateLocked",
            VectorEvent::ReplicaUpdateUnlocked(_) => "Vector::ReplicaUpdateUnlocked",
            VectorEvent::Heartbeat(_) => "Vector::Heartbeat",
            VectorEvent::HeartbeatLocked(_) => "Vector::HeartbeatLocked",
            VectorEvent::ClockTick => "Vector::ClockTick",
            VectorEvent::ClockTickLocked => "Vector::ClockTickLocked",
            VectorEvent::ClockTickUnlocked { .. } => "Vector::ClockTickUnlocked",
            VectorEvent::StartGstRound => "Vector::StartGstRound",
            VectorEvent::LstFromLeaf(_) => "Vector::LstFromLeaf",
            VectorEvent::LstRootLocked => "Vector::LstRootLocked",
            VectorEvent::LstRootUnlocked => "Vector::LstRootUnlocked",
            VectorEvent::GstFromRoot(_) => "Vector::GstFromRoot",
            VectorEvent::GstFromRootLocked(_) => "Vector::GstFromRootLocked",
            VectorEvent::GstFromRootUnlocked => "Vector::GstFromRootUnlocked",
            VectorEvent::SliceRequest(_) => "Vector::SliceRequest",
            VectorEvent::SliceRequestLocked(_) => "Vector::SliceRequestLocked",
            VectorEvent::SliceRequestUnlocked(_) => "Vector::SliceRequestUnlocked",
            VectorEvent::SliceResponse(_) => "Vector::SliceResponse",
            VectorEvent::RotxRequest(_) => "Vector::RotxRequest",
            VectorEvent::RotxRequestLocked(_) => "Vector::RotxRequestLocked",
            VectorEvent::RotxRequestUnlocked(_) => "Vector::RotxRequestUnlocked",
            VectorEvent::RotxResponse(_) => "Vector::RotxResponse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_control_classification() {
        assert!(Event::FreeCore.is_cpu_control());
        assert!(Event::RunQueued.is_cpu_control());
        let acquire = Event::LockAcquire {
            lock: LockId(0),
            cont: Box::new(Event::Scalar(ScalarEvent::ClockTickLocked)),
        };
        assert!(acquire.is_cpu_control());
        assert!(acquire.is_lock_op());
        assert!(!Event::FreeCore.is_lock_op());
        let tick = Event::Scalar(ScalarEvent::ClockTick);
        assert!(!tick.is_cpu_control());
        assert_eq!(tick.type_name(), "Scalar::ClockTick");
    }
}
