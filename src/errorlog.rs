//! A bounded ring of recent errors plus four monotonic success counters.

/// Ring capacity. The source uses `N = 0x21 = 33`: 32 rotating slots
/// followed by one pinned slot, with overflow arithmetic that relies on
/// `N - 1` being a power of two. Do not change this without re-deriving
/// the mask in [`ErrorLog::record`].
pub const CAPACITY: usize = 0x21;

/// The four logging categories a command outcome can be recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Erase,
    Unknown1,
    Read,
    Unknown3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEntry {
    pub page: u32,
    pub category: Category,
    pub status: i32,
}

const ZERO_ENTRY: ErrorEntry = ErrorEntry { page: 0, category: Category::Read, status: 0 };

/// The session's error log: four success counters plus the bounded ring
/// of recent failures.
pub struct ErrorLog {
    successful_deletes: u32,
    unknown2: u32,
    successful_reads: u32,
    unknown4: u32,
    error_index: u32,
    error_overflow_index: u32,
    errors: [ErrorEntry; CAPACITY],
}

impl ErrorLog {
    pub const fn new() -> Self {
        Self {
            successful_deletes: 0,
            unknown2: 0,
            successful_reads: 0,
            unknown4: 0,
            error_index: 0,
            error_overflow_index: 0,
            errors: [ZERO_ENTRY; CAPACITY],
        }
    }

    /// Zeroes every counter and ring slot. Called on successful
    /// initialization, per `SPEC_FULL.md` §4.6 step 8.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn successful_deletes(&self) -> u32 {
        self.successful_deletes
    }

    pub fn successful_reads(&self) -> u32 {
        self.successful_reads
    }

    pub fn unknown2(&self) -> u32 {
        self.unknown2
    }

    pub fn unknown4(&self) -> u32 {
        self.unknown4
    }

    /// Number of valid entries currently retained in the ring. `error_index`
    /// climbs from `0` to `CAPACITY - 1` and then stays pinned there: once
    /// saturated, only the rotating region is rewritten, so it is always
    /// the exact count.
    pub fn len(&self) -> usize {
        self.error_index as usize
    }

    fn is_saturated(&self) -> bool {
        self.error_index == (CAPACITY as u32 - 1)
    }

    /// Recent entries, oldest-first while filling and in ring order once
    /// saturated. Only meaningful to call after at least one error; the
    /// unused tail is not included. Slot `CAPACITY - 1` is never written
    /// by [`record`](Self::record) (the saturated branch only cycles
    /// slots `0..CAPACITY - 1`), so it is always excluded here.
    pub fn entries(&self) -> &[ErrorEntry] {
        &self.errors[..self.error_index as usize]
    }

    /// Records the outcome of one command. A zero `status` increments
    /// the matching success counter; a non-zero `status` inserts into
    /// the ring, evicting the oldest rotating-region entry once full.
    pub fn record(&mut self, page: u32, category: Category, status: i32) {
        if status == 0 {
            match category {
                Category::Read => self.successful_reads += 1,
                Category::Erase => self.successful_deletes += 1,
                Category::Unknown1 => self.unknown2 += 1,
                Category::Unknown3 => self.unknown4 += 1,
            }
            return;
        }

        let slot = if self.is_saturated() {
            let slot = self.error_overflow_index;
            self.error_overflow_index = (self.error_overflow_index + 1) & (CAPACITY as u32 - 2);
            slot
        } else {
            let slot = self.error_overflow_index + self.error_index;
            self.error_index += 1;
            slot
        };
        self.errors[slot as usize] = ErrorEntry { page, category, status };
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new()
    }
}
