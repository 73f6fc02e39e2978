//! Lazy backtracking enumeration over levels of alternative transforms.
//!
//! Each level offers an implicit identity choice followed by its transforms.
//! Values are produced in odometer order (rightmost level varies fastest) by
//! applying one choice per level to the value accumulated so far. A transform
//! returning `None` does not apply to that value and is skipped. Only the
//! current path of partial values is held, so consumers may stop early at no
//! cost for the unvisited combinations.

/// One alternative at a level.
pub type Choice<T> = Box<dyn Fn(&T) -> Option<T> + Send + Sync>;

pub struct Backtrack<T> {
    start: T,
    levels: Vec<Vec<Choice<T>>>,
    cursor: Vec<usize>,
    path: Vec<T>,
    started: bool,
    done: bool,
}

impl<T: Clone> Backtrack<T> {
    pub fn new(start: T) -> Self {
        Self {
            start,
            levels: Vec::new(),
            cursor: Vec::new(),
            path: Vec::new(),
            started: false,
            done: false,
        }
    }

    /// Append a level of alternatives (identity is implicit).
    pub fn level(mut self, choices: Vec<Choice<T>>) -> Self {
        self.push_level(choices);
        self
    }

    pub fn push_level(&mut self, choices: Vec<Choice<T>>) {
        self.levels.push(choices);
        self.reset();
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Restart enumeration from the first combination.
    pub fn reset(&mut self) {
        self.cursor.clear();
        self.path.clear();
        self.started = false;
        self.done = false;
    }

    /// Fill the remaining levels with identity choices.
    fn descend(&mut self) -> Option<T> {
        while self.cursor.len() < self.levels.len() {
            let value = self.path[self.cursor.len()].clone();
            self.path.push(value);
            self.cursor.push(0);
        }
        self.path.last().cloned()
    }

    /// Move to the next applicable choice, backing up levels as they run out.
    fn advance(&mut self) -> Option<T> {
        while let Some(mut k) = self.cursor.pop() {
            self.path.pop();
            let level = self.cursor.len();
            let base = &self.path[level];
            while k < self.levels[level].len() {
                k += 1;
                if let Some(value) = (self.levels[level][k - 1])(base) {
                    self.cursor.push(k);
                    self.path.push(value);
                    return self.descend();
                }
            }
        }
        None
    }
}

impl<T: Clone> Iterator for Backtrack<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.done {
            return None;
        }
        let next = if self.started {
            self.advance()
        } else {
            self.started = true;
            self.path.push(self.start.clone());
            self.descend()
        };
        if next.is_none() {
            self.done = true;
        }
        next
    }
}

impl<T> std::fmt::Debug for Backtrack<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backtrack")
            .field("levels", &self.levels.len())
            .field("cursor", &self.cursor)
            .field("done", &self.done)
            .finish()
    }
}
