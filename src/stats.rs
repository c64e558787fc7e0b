/// Counters collected during one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub documents_total: usize,
    pub start_index: usize,
    pub documents_processed: u64,
    pub missing_data: u64,
    pub documents_skipped: u64,
    pub shards_created: u32,
    pub last_index: Option<usize>,
}

impl RunStats {
    pub fn new(documents_total: usize, start_index: usize) -> Self {
        Self {
            documents_total,
            start_index,
            ..Self::default()
        }
    }

    pub fn record_processed(&mut self, index: usize, incomplete: bool) {
        self.documents_processed += 1;
        if incomplete {
            self.missing_data += 1;
        }
        self.last_index = Some(index);
    }

    pub fn record_skipped(&mut self, index: usize) {
        self.documents_skipped += 1;
        self.last_index = Some(index);
    }

    /// Documents handled either way since `start_index`
    pub fn documents_seen(&self) -> u64 {
        self.documents_processed + self.documents_skipped
    }

    /// Index to pass as `--start-index` to continue after this run
    pub fn resume_index(&self) -> usize {
        self.last_index.map_or(self.start_index, |i| i + 1)
    }
}
