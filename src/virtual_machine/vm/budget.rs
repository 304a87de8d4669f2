/// Default number of dispatches a run may perform before it is stopped.
pub const DEFAULT_INSTRUCTION_BUDGET: u64 = 1_000;

/// Number of dispatch categories tracked by [`DispatchProfile`].
const DISPATCH_CATEGORY_COUNT: usize = 7;

/// Buckets that dispatches are tallied under.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum DispatchCategory {
    /// PUSH, DUP, SWAP, DROP.
    Stack = 0,
    /// ADD, COMPARE_EQ, MOD, RANDOM.
    Arithmetic = 1,
    /// PEEK, POKE.
    Memory = 2,
    /// FACTORIZE, BUILD, GET_PRIME, GET_PRIME_IDX.
    Prime = 3,
    /// NOP, JUMP, JUMP_IF_ZERO, HALT, CALL, RETURN.
    Control = 4,
    /// PRINT, INPUT and emitted data cells.
    Io = 5,
    /// Block and spectral headers.
    Region = 6,
}

impl DispatchCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DispatchCategory::Stack => "Stack",
            DispatchCategory::Arithmetic => "Arithmetic",
            DispatchCategory::Memory => "Program Memory",
            DispatchCategory::Prime => "Prime / Chunk",
            DispatchCategory::Control => "Control Flow",
            DispatchCategory::Io => "I/O",
            DispatchCategory::Region => "Region Header",
        }
    }

    /// All categories in discriminant order.
    pub const ALL: [DispatchCategory; DISPATCH_CATEGORY_COUNT] = [
        DispatchCategory::Stack,
        DispatchCategory::Arithmetic,
        DispatchCategory::Memory,
        DispatchCategory::Prime,
        DispatchCategory::Control,
        DispatchCategory::Io,
        DispatchCategory::Region,
    ];
}

/// Per-category dispatch counts for a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchProfile {
    counts: [u64; DISPATCH_CATEGORY_COUNT],
}

impl DispatchProfile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn record(&mut self, category: DispatchCategory) {
        let slot = &mut self.counts[category as usize];
        *slot = slot.saturating_add(1);
    }

    pub fn get(&self, category: DispatchCategory) -> u64 {
        self.counts[category as usize]
    }

    /// Total dispatches across all categories.
    pub fn total(&self) -> u64 {
        self.counts.iter().fold(0u64, |acc, &v| acc.saturating_add(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (DispatchCategory, u64)> {
        DispatchCategory::ALL.into_iter().zip(self.counts)
    }
}
