#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatementKind {
    Insert,
    EscapedCall,
}

#[derive(Debug, Clone)]
pub(crate) enum Op {
    Prepare(StatementKind),
    Bind { id: i64, note: String },
    Execute,
    AddBatch,
    ExecuteBatch,
    CloseStatement,
    LobCreate(Vec<u8>),
    LobWrite { position: usize, data: Vec<u8> },
    LobTruncate(usize),
    LobClear,
    LobCommit,
    LobFree,
    Probe,
    Sleep(u64),
}

/// What a session should look like if the driver behaves correctly.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionModel {
    pub(crate) statement: Option<StatementModel>,
    pub(crate) lob: Option<LobModel>,
    /// Requests the engine must have seen, by kind.
    pub(crate) executes: usize,
    pub(crate) batches: usize,
    pub(crate) frees: usize,
    pub(crate) duplicates: usize,
    pub(crate) rows_written: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct StatementModel {
    pub(crate) kind: StatementKind,
    pub(crate) bound: bool,
    pub(crate) batch_len: usize,
}

impl StatementModel {
    pub(crate) fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            bound: false,
            batch_len: 0,
        }
    }

    pub(crate) fn batches(&self) -> bool {
        self.kind == StatementKind::Insert
    }
}

/// Contents of the baseline object and of the object reads currently see.
#[derive(Debug, Clone)]
pub(crate) struct LobModel {
    pub(crate) original: Vec<u8>,
    pub(crate) current: Vec<u8>,
    pub(crate) private: bool,
}

impl LobModel {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self {
            original: bytes.clone(),
            current: bytes,
            private: false,
        }
    }

    /// Apply a write; returns whether it started a new update cycle.
    pub(crate) fn write(&mut self, position: usize, data: &[u8]) -> bool {
        let end = position + data.len();
        if self.current.len() < end {
            self.current.resize(end, 0);
        }
        self.current[position..end].copy_from_slice(data);
        !std::mem::replace(&mut self.private, true)
    }

    pub(crate) fn truncate(&mut self, length: usize) -> bool {
        self.current.truncate(length);
        !std::mem::replace(&mut self.private, true)
    }

    pub(crate) fn clear(&mut self) {
        self.current = self.original.clone();
        self.private = false;
    }

    pub(crate) fn commit(&mut self) {
        self.original = self.current.clone();
        self.private = false;
    }
}
