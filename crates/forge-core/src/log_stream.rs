use std::collections::BTreeMap;
use std::collections::VecDeque;

/// Emits only the unseen suffix of a log file that grows between reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCursor {
    emitted: usize,
}

impl LogCursor {
    pub fn position(&self) -> usize {
        self.emitted
    }

    pub fn feed<'a>(&mut self, full: &'a str) -> &'a str {
        let start = if self.emitted <= full.len() && full.is_char_boundary(self.emitted) {
            self.emitted
        } else {
            // Shrunk or replaced: everything is new.
            0
        };
        self.emitted = full.len();
        &full[start..]
    }

    pub fn reset(&mut self) {
        self.emitted = 0;
    }
}

/// One cursor per registered log path.
#[derive(Debug, Clone, Default)]
pub struct LogStreams {
    cursors: BTreeMap<String, LogCursor>,
}

impl LogStreams {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cursors: paths
                .into_iter()
                .map(|path| (path.into(), LogCursor::default()))
                .collect(),
        }
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.cursors.contains_key(path)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &str> {
        self.cursors.keys().map(String::as_str)
    }

    /// New suffix for a tracked log, `None` for untracked paths.
    pub fn feed<'a>(&mut self, path: &str, full: &'a str) -> Option<&'a str> {
        self.cursors.get_mut(path).map(|cursor| cursor.feed(full))
    }

    pub fn cursor(&self, path: &str) -> Option<LogCursor> {
        self.cursors.get(path).copied()
    }

    pub fn reset(&mut self, path: &str) {
        if let Some(cursor) = self.cursors.get_mut(path) {
            cursor.reset();
        }
    }

    pub fn reset_all(&mut self) {
        for cursor in self.cursors.values_mut() {
            cursor.reset();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalChunk {
    pub seq: u64,
    pub log_path: String,
    pub text: String,
}

/// Append-only sink for streamed log output.
#[derive(Debug, Clone)]
pub struct TerminalBuffer {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<TerminalChunk>,
}

impl TerminalBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            next_seq: 1,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn append(&mut self, log_path: &str, text: &str) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(TerminalChunk {
            seq,
            log_path: log_path.to_string(),
            text: text.to_string(),
        });
        seq
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.next_seq = 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = &TerminalChunk> {
        self.buf.iter()
    }

    /// Chunks with `seq > after`.
    pub fn since(&self, after: u64) -> impl Iterator<Item = &TerminalChunk> {
        self.buf.iter().filter(move |chunk| chunk.seq > after)
    }

    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for TerminalBuffer {
    fn default() -> Self {
        Self::new(2_000)
    }
}
