use serde::Serialize;

use crate::cursor::{RecordCursor, ThreadInfo};
use crate::fuchsia::layout::{
    arg_type, inline_string_len, is_inline_string, is_inline_thread, ArgHeader,
};
use crate::string_pool::{StringId, StringPool};

/// Resolves string and thread indices to their values.
///
/// Implemented by a live [`Provider`](crate::fuchsia::provider::Provider)
/// during tokenization and by a [`FuchsiaRecord`](crate::fuchsia::FuchsiaRecord)
/// snapshot when the record is decoded later.
pub trait SymbolLookup {
    fn lookup_string(&self, index: u32) -> StringId;
    fn lookup_thread(&self, index: u32) -> ThreadInfo;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Null,
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(StringId),
    Pointer(u64),
    Koid(u64),
    Bool(bool),
    /// An argument type this decoder does not know; its payload is skipped.
    Unknown(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Arg {
    pub name: StringId,
    pub value: ArgValue,
}

/// Reads a string that is either inline in the record or referenced by index.
pub fn read_string_ref(
    cursor: &mut RecordCursor<'_>,
    string_ref: u32,
    lookup: &impl SymbolLookup,
    pool: &StringPool,
) -> Option<StringId> {
    if is_inline_string(string_ref) {
        let bytes = cursor.read_inline_string(inline_string_len(string_ref))?;
        Some(pool.intern_bytes(bytes))
    } else {
        Some(lookup.lookup_string(string_ref))
    }
}

/// Reads a thread that is either inline in the record or referenced by index.
pub fn read_thread_ref(
    cursor: &mut RecordCursor<'_>,
    thread_ref: u32,
    lookup: &impl SymbolLookup,
) -> Option<ThreadInfo> {
    if is_inline_thread(thread_ref) {
        cursor.read_inline_thread()
    } else {
        Some(lookup.lookup_thread(thread_ref))
    }
}

/// Decodes `count` arguments starting at the cursor.
///
/// After each argument the cursor is moved to the word its header declares as
/// the end, so unknown argument types are skipped. Returns `None` if any
/// argument is truncated or declares a size that overruns the record.
pub fn parse_args(
    cursor: &mut RecordCursor<'_>,
    count: u32,
    lookup: &impl SymbolLookup,
    pool: &StringPool,
) -> Option<Vec<Arg>> {
    let mut args = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let base = cursor.word_index();
        let header = ArgHeader::decode(cursor.read_u64()?);
        if header.size_words == 0 {
            return None;
        }

        let name = read_string_ref(cursor, header.name_ref, lookup, pool)?;
        let value = match header.arg_type {
            arg_type::NULL => ArgValue::Null,
            arg_type::INT32 => ArgValue::Int32(header.value_bits as i32),
            arg_type::UINT32 => ArgValue::Uint32(header.value_bits),
            arg_type::INT64 => ArgValue::Int64(cursor.read_i64()?),
            arg_type::UINT64 => ArgValue::Uint64(cursor.read_u64()?),
            arg_type::DOUBLE => ArgValue::Double(cursor.read_f64()?),
            arg_type::STRING => ArgValue::String(read_string_ref(
                cursor,
                header.string_value_ref(),
                lookup,
                pool,
            )?),
            arg_type::POINTER => ArgValue::Pointer(cursor.read_u64()?),
            arg_type::KOID => ArgValue::Koid(cursor.read_u64()?),
            arg_type::BOOL => ArgValue::Bool(header.value_bits & 1 != 0),
            other => ArgValue::Unknown(other),
        };

        cursor.set_word_index(base.checked_add(header.size_words)?)?;
        args.push(Arg { name, value });
    }
    Some(args)
}

/// Finds the value of the argument called `name`.
pub fn find_arg(args: &[Arg], name: StringId) -> Option<ArgValue> {
    args.iter().find(|a| a.name == name).map(|a| a.value)
}
