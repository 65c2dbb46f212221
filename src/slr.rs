//! SLR(1) grammar compiler producing packed [`ParserTables`].
//!
//! Conflicts are resolved rather than rejected: shift wins over reduce and
//! the lower numbered production wins a reduce/reduce conflict. Every
//! resolution is returned to the caller and logged.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::{
    error::GrammarError,
    tables::{ParserTables, pack_row},
};

/// A grammar symbol: terminal or non-terminal id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GSym {
    T(usize),
    N(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub lhs: usize,
    pub rhs: &'static [GSym],
}

/// Rule 0 is the start rule; its left hand side is the start symbol.
#[derive(Debug, Clone, Copy)]
pub struct Grammar<'g> {
    pub terminals: usize,
    pub nonterminals: usize,
    pub eof: usize,
    pub rules: &'g [Rule],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Act {
    Shift(usize),
    Reduce(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub state: usize,
    pub terminal: usize,
    pub kept: Act,
    pub discarded: Act,
}

impl Conflict {
    pub const fn is_shift_reduce(&self) -> bool {
        matches!(
            (self.kept, self.discarded),
            (Act::Shift(_), Act::Reduce(_)) | (Act::Reduce(_), Act::Shift(_))
        )
    }
}

/// `(rule, dot)`
type Item = (usize, usize);

struct Analysis<'g> {
    grammar: &'g Grammar<'g>,
    by_lhs: Vec<Vec<usize>>,
    nullable: Vec<bool>,
    first: Vec<BTreeSet<usize>>,
    follow: Vec<BTreeSet<usize>>,
}

impl<'g> Analysis<'g> {
    fn new(grammar: &'g Grammar<'g>) -> Self {
        let mut by_lhs = vec![Vec::new(); grammar.nonterminals];
        for (index, rule) in grammar.rules.iter().enumerate() {
            if let Some(rules) = by_lhs.get_mut(rule.lhs) {
                rules.push(index);
            }
        }
        let mut analysis = Self {
            grammar,
            by_lhs,
            nullable: vec![false; grammar.nonterminals],
            first: vec![BTreeSet::new(); grammar.nonterminals],
            follow: vec![BTreeSet::new(); grammar.nonterminals],
        };
        analysis.compute_first();
        analysis.compute_follow();
        analysis
    }

    /// FIRST of a symbol string and whether the whole string is nullable.
    fn first_of(&self, symbols: &[GSym]) -> (BTreeSet<usize>, bool) {
        let mut first = BTreeSet::new();
        for symbol in symbols {
            match *symbol {
                GSym::T(t) => {
                    first.insert(t);
                    return (first, false);
                }
                GSym::N(n) => {
                    first.extend(self.first[n].iter().copied());
                    if !self.nullable[n] {
                        return (first, false);
                    }
                }
            }
        }
        (first, true)
    }

    fn compute_first(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for rule in self.grammar.rules {
                let (first, nullable) = self.first_of(rule.rhs);
                let before = self.first[rule.lhs].len();
                self.first[rule.lhs].extend(first);
                changed |= self.first[rule.lhs].len() != before;
                if nullable && !self.nullable[rule.lhs] {
                    self.nullable[rule.lhs] = true;
                    changed = true;
                }
            }
        }
    }

    fn compute_follow(&mut self) {
        if let Some(start) = self.grammar.rules.first() {
            self.follow[start.lhs].insert(self.grammar.eof);
        }
        let mut changed = true;
        while changed {
            changed = false;
            for rule in self.grammar.rules {
                for (i, symbol) in rule.rhs.iter().enumerate() {
                    let GSym::N(n) = *symbol else { continue };
                    let (mut follow, nullable) = self.first_of(&rule.rhs[i + 1..]);
                    if nullable {
                        follow.extend(self.follow[rule.lhs].iter().copied());
                    }
                    let before = self.follow[n].len();
                    self.follow[n].extend(follow);
                    changed |= self.follow[n].len() != before;
                }
            }
        }
    }

    fn closure(&self, kernel: &[Item]) -> Vec<Item> {
        let mut items = kernel.to_vec();
        let mut seen: BTreeSet<Item> = kernel.iter().copied().collect();
        let mut i = 0;
        while let Some(&(rule, dot)) = items.get(i) {
            if let Some(GSym::N(n)) = self.grammar.rules[rule].rhs.get(dot) {
                for &next in &self.by_lhs[*n] {
                    if seen.insert((next, 0)) {
                        items.push((next, 0));
                    }
                }
            }
            i += 1;
        }
        items
    }
}

fn validate(grammar: &Grammar<'_>) -> Result<(), GrammarError> {
    if grammar.rules.is_empty() {
        return Err(GrammarError::Empty);
    }
    for (production, rule) in grammar.rules.iter().enumerate() {
        if rule.lhs >= grammar.nonterminals {
            return Err(GrammarError::UnknownSymbol {
                production,
                symbol: format!("N({})", rule.lhs),
            });
        }
        for symbol in rule.rhs {
            let known = match *symbol {
                GSym::T(t) => t < grammar.terminals,
                GSym::N(n) => n < grammar.nonterminals,
            };
            if !known {
                return Err(GrammarError::UnknownSymbol {
                    production,
                    symbol: format!("{symbol:?}"),
                });
            }
        }
    }
    Ok(())
}

fn encode(value: usize) -> Result<i16, GrammarError> {
    value
        .checked_add(1)
        .and_then(|v| i16::try_from(v).ok())
        .ok_or(GrammarError::TooLarge {
            limit: i16::MAX as usize,
        })
}

/// Compiles `grammar` into parser tables, returning the conflicts resolved
/// along the way.
pub fn build(grammar: &Grammar<'_>) -> Result<(ParserTables, Vec<Conflict>), GrammarError> {
    validate(grammar)?;
    let analysis = Analysis::new(grammar);

    let mut states: IndexSet<Vec<Item>> = IndexSet::new();
    states.insert(vec![(0, 0)]);
    let mut transitions: Vec<BTreeMap<GSym, usize>> = Vec::new();
    let mut completed: Vec<Vec<usize>> = Vec::new();

    let mut index = 0;
    while let Some(kernel) = states.get_index(index).cloned() {
        let mut advanced: BTreeMap<GSym, Vec<Item>> = BTreeMap::new();
        let mut reduces = Vec::new();
        for (rule, dot) in analysis.closure(&kernel) {
            match grammar.rules[rule].rhs.get(dot) {
                Some(symbol) => advanced.entry(*symbol).or_default().push((rule, dot + 1)),
                None => reduces.push(rule),
            }
        }
        let mut edges = BTreeMap::new();
        for (symbol, mut next) in advanced {
            next.sort_unstable();
            next.dedup();
            let (target, _) = states.insert_full(next);
            edges.insert(symbol, target);
        }
        reduces.sort_unstable();
        transitions.push(edges);
        completed.push(reduces);
        index += 1;
    }
    debug!(
        states = states.len(),
        productions = grammar.rules.len(),
        "built LR(0) automaton"
    );

    let mut conflicts = Vec::new();
    let mut action_rows = Vec::with_capacity(states.len());
    let mut reduce_rows = Vec::with_capacity(states.len());
    for (state, (edges, reduces)) in transitions.iter().zip(&completed).enumerate() {
        let mut actions: BTreeMap<usize, Act> = BTreeMap::new();
        let mut gotos = Vec::new();
        for (symbol, target) in edges {
            match *symbol {
                GSym::T(t) => {
                    actions.insert(t, Act::Shift(*target));
                }
                GSym::N(n) => gotos.push((n, *target)),
            }
        }
        for &rule in reduces {
            for &terminal in &analysis.follow[grammar.rules[rule].lhs] {
                let proposed = Act::Reduce(rule);
                let Some(existing) = actions.get(&terminal).copied() else {
                    actions.insert(terminal, proposed);
                    continue;
                };
                let (kept, discarded) = match existing {
                    Act::Shift(_) => (existing, proposed),
                    Act::Reduce(other) if other <= rule => (existing, proposed),
                    Act::Reduce(_) => (proposed, existing),
                };
                warn!(state, terminal, ?kept, ?discarded, "resolved grammar conflict");
                actions.insert(terminal, kept);
                conflicts.push(Conflict {
                    state,
                    terminal,
                    kept,
                    discarded,
                });
            }
        }

        let mut pairs = Vec::with_capacity(actions.len());
        for (terminal, act) in actions {
            let value = match act {
                Act::Shift(target) => encode(target)?,
                Act::Reduce(rule) => -encode(rule)?,
            };
            pairs.push((symbol_id(terminal)?, value));
        }
        action_rows.push(pack_row(pairs, 0));

        let mut pairs = Vec::with_capacity(gotos.len());
        for (nonterminal, target) in gotos {
            let target = i16::try_from(target).map_err(|_| GrammarError::TooLarge {
                limit: i16::MAX as usize,
            })?;
            pairs.push((symbol_id(nonterminal)?, target));
        }
        reduce_rows.push(pack_row(pairs, -1));
    }

    let mut production_rows = Vec::with_capacity(grammar.rules.len());
    for rule in grammar.rules {
        production_rows.push(vec![symbol_id(rule.lhs)?, symbol_id(rule.rhs.len())?]);
    }

    Ok((
        ParserTables::new(action_rows, reduce_rows, production_rows),
        conflicts,
    ))
}

fn symbol_id(id: usize) -> Result<i16, GrammarError> {
    i16::try_from(id).map_err(|_| GrammarError::TooLarge {
        limit: i16::MAX as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EOF: usize = 0;
    const NUM: usize = 1;
    const PLUS: usize = 2;
    const STAR: usize = 3;

    const S: usize = 0;
    const E: usize = 1;
    const T: usize = 2;

    static UNAMBIGUOUS: &[Rule] = &[
        Rule {
            lhs: S,
            rhs: &[GSym::N(E), GSym::T(EOF)],
        },
        Rule {
            lhs: E,
            rhs: &[GSym::N(E), GSym::T(PLUS), GSym::N(T)],
        },
        Rule {
            lhs: E,
            rhs: &[GSym::N(T)],
        },
        Rule {
            lhs: T,
            rhs: &[GSym::N(T), GSym::T(STAR), GSym::T(NUM)],
        },
        Rule {
            lhs: T,
            rhs: &[GSym::T(NUM)],
        },
    ];

    static AMBIGUOUS: &[Rule] = &[
        Rule {
            lhs: S,
            rhs: &[GSym::N(E), GSym::T(EOF)],
        },
        Rule {
            lhs: E,
            rhs: &[GSym::N(E), GSym::T(PLUS), GSym::N(E)],
        },
        Rule {
            lhs: E,
            rhs: &[GSym::T(NUM)],
        },
    ];

    fn grammar(rules: &'static [Rule]) -> Grammar<'static> {
        Grammar {
            terminals: 4,
            nonterminals: 3,
            eof: EOF,
            rules,
        }
    }

    #[test]
    #[ntest::timeout(1000)]
    fn test_unambiguous_grammar_has_no_conflicts() {
        let (tables, conflicts) = build(&grammar(UNAMBIGUOUS)).unwrap();
        assert!(conflicts.is_empty(), "{conflicts:?}");
        assert_eq!(tables.productions(), UNAMBIGUOUS.len());
        assert_eq!(tables.production(1), Some((E, 3)));
        assert!(tables.action(0, NUM) > 0, "NUM shifts in the start state");
        assert_eq!(tables.action(0, PLUS), 0);
        assert!(tables.goto(0, E) >= 0);
    }

    #[test]
    #[ntest::timeout(1000)]
    fn test_shift_wins_shift_reduce_conflict() {
        let (_, conflicts) = build(&grammar(AMBIGUOUS)).unwrap();
        assert!(!conflicts.is_empty());
        for conflict in &conflicts {
            assert!(conflict.is_shift_reduce());
            assert!(matches!(conflict.kept, Act::Shift(_)));
            assert_eq!(conflict.terminal, PLUS);
        }
    }

    #[test]
    #[ntest::timeout(1000)]
    fn test_lower_production_wins_reduce_reduce_conflict() {
        static RULES: &[Rule] = &[
            Rule {
                lhs: S,
                rhs: &[GSym::N(E), GSym::T(EOF)],
            },
            Rule {
                lhs: E,
                rhs: &[GSym::N(T)],
            },
            Rule {
                lhs: E,
                rhs: &[GSym::T(NUM)],
            },
            Rule {
                lhs: T,
                rhs: &[GSym::T(NUM)],
            },
        ];
        let (_, conflicts) = build(&grammar(RULES)).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kept, Act::Reduce(2));
        assert_eq!(conflicts[0].discarded, Act::Reduce(3));
        assert!(!conflicts[0].is_shift_reduce());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_rejects_invalid_grammars() {
        assert_eq!(build(&grammar(&[])).unwrap_err(), GrammarError::Empty);
        static BAD: &[Rule] = &[Rule {
            lhs: S,
            rhs: &[GSym::T(9)],
        }];
        assert!(matches!(
            build(&grammar(BAD)),
            Err(GrammarError::UnknownSymbol { production: 0, .. })
        ));
    }
}
