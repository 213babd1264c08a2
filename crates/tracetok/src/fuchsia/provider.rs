use std::collections::HashMap;

use crate::cursor::ThreadInfo;
use crate::fuchsia::args::SymbolLookup;
use crate::string_pool::StringId;

/// Ticks per second assumed until an initialization record says otherwise.
pub const DEFAULT_TICKS_PER_SECOND: u64 = 1_000_000_000;

/// Per-provider symbol state: interned strings and threads referenced by
/// index from later records, plus the provider's tick rate.
#[derive(Debug, Clone)]
pub struct Provider {
    name: String,
    string_table: HashMap<u32, StringId>,
    thread_table: HashMap<u32, ThreadInfo>,
    ticks_per_second: u64,
}

impl Provider {
    pub fn new(name: impl Into<String>) -> Self {
        Provider {
            name: name.into(),
            string_table: HashMap::new(),
            thread_table: HashMap::new(),
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a string index; unknown indices yield the null string.
    pub fn get_string(&self, index: u32) -> StringId {
        self.string_table
            .get(&index)
            .copied()
            .unwrap_or(StringId::NULL)
    }

    /// Resolves a thread index; unknown indices yield a zeroed thread.
    pub fn get_thread(&self, index: u32) -> ThreadInfo {
        self.thread_table.get(&index).copied().unwrap_or_default()
    }

    pub fn set_string(&mut self, index: u32, id: StringId) {
        self.string_table.insert(index, id);
    }

    pub fn set_thread(&mut self, index: u32, info: ThreadInfo) {
        self.thread_table.insert(index, info);
    }

    pub fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    pub fn set_ticks_per_second(&mut self, ticks_per_second: u64) {
        self.ticks_per_second = ticks_per_second;
    }
}

impl SymbolLookup for Provider {
    fn lookup_string(&self, index: u32) -> StringId {
        self.get_string(index)
    }

    fn lookup_thread(&self, index: u32) -> ThreadInfo {
        self.get_thread(index)
    }
}

/// All providers seen in a stream, and which one is current.
///
/// Provider 0 (with an empty name) exists from construction and starts out
/// current, so there is always a current provider.
#[derive(Debug)]
pub struct ProviderTable {
    providers: HashMap<u32, Provider>,
    current: u32,
}

impl Default for ProviderTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderTable {
    pub fn new() -> Self {
        let mut providers = HashMap::new();
        providers.insert(0, Provider::new(""));
        ProviderTable {
            providers,
            current: 0,
        }
    }

    /// Creates or replaces provider `id` and makes it current.
    pub fn register_provider(&mut self, id: u32, name: impl Into<String>) {
        self.providers.insert(id, Provider::new(name));
        self.current = id;
    }

    /// Makes provider `id` current, creating it if it was never announced.
    pub fn select_provider(&mut self, id: u32) {
        self.providers
            .entry(id)
            .or_insert_with(|| Provider::new(""));
        self.current = id;
    }

    pub fn current_id(&self) -> u32 {
        self.current
    }

    pub fn current(&self) -> &Provider {
        // `current` always names an entry: every path that changes it inserts first.
        &self.providers[&self.current]
    }

    pub fn current_mut(&mut self) -> &mut Provider {
        self.providers
            .entry(self.current)
            .or_insert_with(|| Provider::new(""))
    }

    pub fn get(&self, id: u32) -> Option<&Provider> {
        self.providers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn get_string(&self, index: u32) -> StringId {
        self.current().get_string(index)
    }

    pub fn get_thread(&self, index: u32) -> ThreadInfo {
        self.current().get_thread(index)
    }

    pub fn set_string(&mut self, index: u32, id: StringId) {
        self.current_mut().set_string(index, id);
    }

    pub fn set_thread(&mut self, index: u32, info: ThreadInfo) {
        self.current_mut().set_thread(index, info);
    }

    pub fn set_ticks_per_second(&mut self, ticks_per_second: u64) {
        self.current_mut().set_ticks_per_second(ticks_per_second);
    }
}
