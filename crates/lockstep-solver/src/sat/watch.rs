use super::clause::Clause;
use super::Lit;

/// Two-watched literals index for efficient unit propagation.
///
/// Each clause with two or more literals watches exactly two of them. When
/// a watched literal becomes false we look for a replacement; only if none
/// exists does the clause become unit or conflicting.
#[derive(Debug, Default)]
pub struct WatchGraph {
    /// Maps literal index to the clauses watching that literal.
    watches: Vec<Vec<WatchNode>>,
}

/// A watch entry linking a clause to its other watched literal.
#[derive(Debug, Clone, Copy)]
pub struct WatchNode {
    pub clause_id: u32,
    pub other: Lit,
}

impl WatchGraph {
    pub fn new() -> Self {
        Self {
            watches: Vec::new(),
        }
    }

    /// Convert a literal to a dense index (positive and negative literals
    /// of a variable get adjacent slots).
    fn index(lit: Lit) -> usize {
        let abs = lit.unsigned_abs() as usize;
        if lit > 0 {
            abs * 2
        } else {
            abs * 2 + 1
        }
    }

    fn slot_mut(&mut self, lit: Lit) -> &mut Vec<WatchNode> {
        let idx = Self::index(lit);
        if idx >= self.watches.len() {
            self.watches.resize(idx + 1, Vec::new());
        }
        &mut self.watches[idx]
    }

    /// Register the first two literals of `clause` as its watches.
    /// Unit and empty clauses are not watched; the search seeds them
    /// directly.
    pub fn add_clause(&mut self, clause: &Clause) {
        let literals = clause.literals();
        if literals.len() < 2 {
            return;
        }
        let id = clause.id();
        let (first, second) = (literals[0], literals[1]);
        self.slot_mut(first).push(WatchNode {
            clause_id: id,
            other: second,
        });
        self.slot_mut(second).push(WatchNode {
            clause_id: id,
            other: first,
        });
    }

    /// The clauses currently watching `lit`. Cloned by callers before
    /// iteration since propagation rewrites the lists.
    pub fn watchers(&self, lit: Lit) -> &[WatchNode] {
        let idx = Self::index(lit);
        match self.watches.get(idx) {
            Some(nodes) => nodes,
            None => &[],
        }
    }

    /// Move a clause's watch from one literal to another.
    pub fn move_watch(&mut self, clause_id: u32, from: Lit, to: Lit, other: Lit) {
        let idx = Self::index(from);
        if idx < self.watches.len() {
            self.watches[idx].retain(|w| w.clause_id != clause_id);
        }
        self.slot_mut(to).push(WatchNode { clause_id, other });
        // The surviving watch on `other` must now pair with `to`.
        let other_idx = Self::index(other);
        if other_idx < self.watches.len() {
            for node in &mut self.watches[other_idx] {
                if node.clause_id == clause_id {
                    node.other = to;
                }
            }
        }
    }

    /// Drop every watch belonging to a clause with id `>= min_id`,
    /// reverting temporary clause additions.
    pub fn remove_clauses_from(&mut self, min_id: u32) {
        for slot in &mut self.watches {
            slot.retain(|w| w.clause_id < min_id);
        }
    }
}
