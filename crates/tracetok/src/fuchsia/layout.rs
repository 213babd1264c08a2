//! Bit layouts of Fuchsia record header words.
//!
//! The header word of every record shares the type and length fields; the
//! remaining bits are interpreted per record type. Each layout is decoded into
//! a plain struct as soon as the record type is known.

use crate::cursor::{BitRange, WORD_SIZE};

pub const RECORD_TYPE: BitRange = BitRange::new(0, 3);
pub const RECORD_LEN: BitRange = BitRange::new(4, 15);
/// Large records extend the length field to 32 bits.
pub const LARGE_RECORD_LEN: BitRange = BitRange::new(4, 35);

pub mod record_type {
    pub const METADATA: u32 = 0;
    pub const INITIALIZATION: u32 = 1;
    pub const STRING: u32 = 2;
    pub const THREAD: u32 = 3;
    pub const EVENT: u32 = 4;
    pub const BLOB: u32 = 5;
    pub const KERNEL_OBJECT: u32 = 7;
    pub const SCHEDULER: u32 = 8;
    pub const LARGE: u32 = 15;
}

pub mod metadata_type {
    pub const PROVIDER_INFO: u32 = 1;
    pub const PROVIDER_SECTION: u32 = 2;
    pub const PROVIDER_EVENT: u32 = 3;
    pub const TRACE_INFO: u32 = 4;
}

pub mod event_type {
    pub const INSTANT: u32 = 0;
    pub const COUNTER: u32 = 1;
    pub const DURATION_BEGIN: u32 = 2;
    pub const DURATION_END: u32 = 3;
    pub const DURATION_COMPLETE: u32 = 4;
    pub const ASYNC_BEGIN: u32 = 5;
    pub const ASYNC_INSTANT: u32 = 6;
    pub const ASYNC_END: u32 = 7;
    pub const FLOW_BEGIN: u32 = 8;
    pub const FLOW_STEP: u32 = 9;
    pub const FLOW_END: u32 = 10;
}

pub mod arg_type {
    pub const NULL: u32 = 0;
    pub const INT32: u32 = 1;
    pub const UINT32: u32 = 2;
    pub const INT64: u32 = 3;
    pub const UINT64: u32 = 4;
    pub const DOUBLE: u32 = 5;
    pub const STRING: u32 = 6;
    pub const POINTER: u32 = 7;
    pub const KOID: u32 = 8;
    pub const BOOL: u32 = 9;
}

pub mod object_type {
    pub const PROCESS: u32 = 1;
    pub const THREAD: u32 = 2;
}

pub mod sched_type {
    pub const LEGACY_CONTEXT_SWITCH: u32 = 0;
    pub const CONTEXT_SWITCH: u32 = 1;
    pub const THREAD_WAKEUP: u32 = 2;
}

/// Blob type carrying an embedded perfetto proto trace.
pub const PERFETTO_BLOB: u32 = 3;

/// Total record length in bytes, as declared by `header`.
pub fn record_len_bytes(header: u64) -> u64 {
    let words = if RECORD_TYPE.get_u32(header) == record_type::LARGE {
        LARGE_RECORD_LEN.get(header)
    } else {
        RECORD_LEN.get(header)
    };
    words * WORD_SIZE as u64
}

/// String refs with the high bit set are inline; the low 15 bits are the length.
pub fn is_inline_string(string_ref: u32) -> bool {
    string_ref & 0x8000 != 0
}

pub fn inline_string_len(string_ref: u32) -> u32 {
    string_ref & 0x7FFF
}

/// A thread ref of zero means the thread follows inline.
pub fn is_inline_thread(thread_ref: u32) -> bool {
    thread_ref == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataHeader {
    pub metadata_type: u32,
    pub provider_id: u32,
    pub name_len: u32,
}

impl MetadataHeader {
    pub const TYPE: BitRange = BitRange::new(16, 19);
    pub const PROVIDER_ID: BitRange = BitRange::new(20, 51);
    pub const NAME_LEN: BitRange = BitRange::new(52, 59);

    pub fn decode(header: u64) -> Self {
        MetadataHeader {
            metadata_type: Self::TYPE.get_u32(header),
            provider_id: Self::PROVIDER_ID.get_u32(header),
            name_len: Self::NAME_LEN.get_u32(header),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringHeader {
    pub index: u32,
    pub len: u32,
}

impl StringHeader {
    pub const INDEX: BitRange = BitRange::new(16, 30);
    pub const LEN: BitRange = BitRange::new(32, 46);

    pub fn decode(header: u64) -> Self {
        StringHeader {
            index: Self::INDEX.get_u32(header),
            len: Self::LEN.get_u32(header),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadHeader {
    pub index: u32,
}

impl ThreadHeader {
    pub const INDEX: BitRange = BitRange::new(16, 23);

    pub fn decode(header: u64) -> Self {
        ThreadHeader {
            index: Self::INDEX.get_u32(header),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub event_type: u32,
    pub arg_count: u32,
    pub thread_ref: u32,
    pub category_ref: u32,
    pub name_ref: u32,
}

impl EventHeader {
    pub const EVENT_TYPE: BitRange = BitRange::new(16, 19);
    pub const ARG_COUNT: BitRange = BitRange::new(20, 23);
    pub const THREAD_REF: BitRange = BitRange::new(24, 31);
    pub const CATEGORY_REF: BitRange = BitRange::new(32, 47);
    pub const NAME_REF: BitRange = BitRange::new(48, 63);

    pub fn decode(header: u64) -> Self {
        EventHeader {
            event_type: Self::EVENT_TYPE.get_u32(header),
            arg_count: Self::ARG_COUNT.get_u32(header),
            thread_ref: Self::THREAD_REF.get_u32(header),
            category_ref: Self::CATEGORY_REF.get_u32(header),
            name_ref: Self::NAME_REF.get_u32(header),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgHeader {
    pub arg_type: u32,
    pub size_words: u64,
    pub name_ref: u32,
    /// Bits 32..63; holds the value of 32-bit and bool args and the value
    /// ref of string args.
    pub value_bits: u32,
}

impl ArgHeader {
    pub const TYPE: BitRange = BitRange::new(0, 3);
    pub const SIZE: BitRange = BitRange::new(4, 15);
    pub const NAME_REF: BitRange = BitRange::new(16, 31);
    pub const VALUE: BitRange = BitRange::new(32, 63);
    pub const STRING_VALUE_REF: BitRange = BitRange::new(32, 47);
    pub const BOOL_VALUE: BitRange = BitRange::new(32, 32);

    pub fn decode(header: u64) -> Self {
        ArgHeader {
            arg_type: Self::TYPE.get_u32(header),
            size_words: Self::SIZE.get(header),
            name_ref: Self::NAME_REF.get_u32(header),
            value_bits: Self::VALUE.get_u32(header),
        }
    }

    pub fn string_value_ref(&self) -> u32 {
        self.value_bits & 0xFFFF
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobHeader {
    pub name_ref: u32,
    pub size: u32,
    pub blob_type: u32,
}

impl BlobHeader {
    pub const NAME_REF: BitRange = BitRange::new(16, 31);
    pub const SIZE: BitRange = BitRange::new(32, 46);
    pub const BLOB_TYPE: BitRange = BitRange::new(48, 55);

    pub fn decode(header: u64) -> Self {
        BlobHeader {
            name_ref: Self::NAME_REF.get_u32(header),
            size: Self::SIZE.get_u32(header),
            blob_type: Self::BLOB_TYPE.get_u32(header),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelObjectHeader {
    pub object_type: u32,
    pub name_ref: u32,
    pub arg_count: u32,
}

impl KernelObjectHeader {
    pub const OBJECT_TYPE: BitRange = BitRange::new(16, 23);
    pub const NAME_REF: BitRange = BitRange::new(24, 39);
    pub const ARG_COUNT: BitRange = BitRange::new(40, 43);

    pub fn decode(header: u64) -> Self {
        KernelObjectHeader {
            object_type: Self::OBJECT_TYPE.get_u32(header),
            name_ref: Self::NAME_REF.get_u32(header),
            arg_count: Self::ARG_COUNT.get_u32(header),
        }
    }
}

pub const SCHED_EVENT_TYPE: BitRange = BitRange::new(60, 63);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyContextSwitchHeader {
    pub cpu: u32,
    pub outgoing_state: u32,
    pub outgoing_thread_ref: u32,
    pub incoming_thread_ref: u32,
    pub outgoing_priority: i32,
    pub incoming_priority: i32,
}

impl LegacyContextSwitchHeader {
    pub const CPU: BitRange = BitRange::new(16, 23);
    pub const OUTGOING_STATE: BitRange = BitRange::new(24, 27);
    pub const OUTGOING_THREAD_REF: BitRange = BitRange::new(28, 35);
    pub const INCOMING_THREAD_REF: BitRange = BitRange::new(36, 43);
    pub const OUTGOING_PRIORITY: BitRange = BitRange::new(44, 51);
    pub const INCOMING_PRIORITY: BitRange = BitRange::new(52, 59);

    pub fn decode(header: u64) -> Self {
        LegacyContextSwitchHeader {
            cpu: Self::CPU.get_u32(header),
            outgoing_state: Self::OUTGOING_STATE.get_u32(header),
            outgoing_thread_ref: Self::OUTGOING_THREAD_REF.get_u32(header),
            incoming_thread_ref: Self::INCOMING_THREAD_REF.get_u32(header),
            outgoing_priority: Self::OUTGOING_PRIORITY.get(header) as i32,
            incoming_priority: Self::INCOMING_PRIORITY.get(header) as i32,
        }
    }
}

/// Shared by the context switch and thread wakeup scheduler records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedHeader {
    pub arg_count: u32,
    pub cpu: u32,
    pub outgoing_state: u32,
}

impl SchedHeader {
    pub const ARG_COUNT: BitRange = BitRange::new(16, 19);
    pub const CPU: BitRange = BitRange::new(20, 35);
    pub const OUTGOING_STATE: BitRange = BitRange::new(36, 39);

    pub fn decode(header: u64) -> Self {
        SchedHeader {
            arg_count: Self::ARG_COUNT.get_u32(header),
            cpu: Self::CPU.get_u32(header),
            outgoing_state: Self::OUTGOING_STATE.get_u32(header),
        }
    }
}
