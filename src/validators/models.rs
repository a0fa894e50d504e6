//! Content model matching
//!
//! A particle is compiled into a nondeterministic automaton whose transitions
//! are labelled with element declarations and wildcards. Children are matched
//! by simulating the automaton over sets of states, so no backtracking is
//! needed whatever the nesting of sequences, choices and repetitions.

use std::collections::BTreeSet;

use super::complex_types::ElementDecl;
use super::particles::{Compositor, Particle, Term};
use super::wildcards::Wildcard;

/// Repetitions beyond this many optional copies are matched as unbounded
const MAX_UNROLLED: u32 = 256;

/// What a child element was matched by
#[derive(Debug, Clone, Copy)]
pub(crate) enum Label<'s> {
    Element(&'s ElementDecl),
    Any(&'s Wildcard),
}

impl<'s> Label<'s> {
    fn matches(&self, namespace: Option<&str>, local_name: &str) -> bool {
        match self {
            Label::Element(decl) => {
                decl.name.local_name == local_name && decl.name.namespace.as_deref() == namespace
            }
            Label::Any(wildcard) => wildcard.allows(namespace),
        }
    }

    fn describe(&self) -> String {
        match self {
            Label::Element(decl) => decl.name.to_string(),
            Label::Any(_) => "*".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct State<'s> {
    epsilon: Vec<usize>,
    edges: Vec<(Label<'s>, usize)>,
}

/// Set of automaton states the matcher is in
pub(crate) type Position = BTreeSet<usize>;

#[derive(Debug)]
pub(crate) struct ContentModel<'s> {
    states: Vec<State<'s>>,
    accept: usize,
}

impl<'s> ContentModel<'s> {
    pub fn new(particle: &'s Particle) -> Self {
        let mut model = Self {
            states: vec![State::default()],
            accept: 0,
        };
        model.accept = model.particle(particle, 0);
        model
    }

    fn add_state(&mut self) -> usize {
        self.states.push(State::default());
        self.states.len() - 1
    }

    fn epsilon(&mut self, from: usize, to: usize) {
        self.states[from].epsilon.push(to);
    }

    /// Add `particle` starting at state `from`; returns its end state
    fn particle(&mut self, particle: &'s Particle, from: usize) -> usize {
        let mut current = from;
        for _ in 0..particle.occurs.min {
            current = self.term(&particle.term, current);
        }
        match particle.occurs.max {
            Some(max) if max.saturating_sub(particle.occurs.min) <= MAX_UNROLLED => {
                let exit = self.add_state();
                self.epsilon(current, exit);
                for _ in particle.occurs.min..max {
                    current = self.term(&particle.term, current);
                    self.epsilon(current, exit);
                }
                exit
            }
            _ => {
                let hub = self.add_state();
                self.epsilon(current, hub);
                let end = self.term(&particle.term, hub);
                self.epsilon(end, hub);
                hub
            }
        }
    }

    fn term(&mut self, term: &'s Term, from: usize) -> usize {
        match term {
            Term::Element(decl) => self.edge(Label::Element(decl), from),
            Term::Any(wildcard) => self.edge(Label::Any(wildcard), from),
            Term::Group(group) => match group.compositor {
                Compositor::Choice => {
                    let end = self.add_state();
                    for particle in &group.particles {
                        let branch = self.particle(particle, from);
                        self.epsilon(branch, end);
                    }
                    end
                }
                // `all` groups only occur at the top of a content model,
                // where the validator matches them without an automaton
                Compositor::Sequence | Compositor::All => group
                    .particles
                    .iter()
                    .fold(from, |current, particle| self.particle(particle, current)),
            },
        }
    }

    fn edge(&mut self, label: Label<'s>, from: usize) -> usize {
        let to = self.add_state();
        self.states[from].edges.push((label, to));
        to
    }

    fn close(&self, mut position: Position) -> Position {
        let mut stack: Vec<usize> = position.iter().copied().collect();
        while let Some(state) = stack.pop() {
            for &next in &self.states[state].epsilon {
                if position.insert(next) {
                    stack.push(next);
                }
            }
        }
        position
    }

    /// Position before any child has been matched
    pub fn start(&self) -> Position {
        self.close(BTreeSet::from([0]))
    }

    /// Match one child element. Element declarations win over wildcards when
    /// both accept the name.
    pub fn advance(
        &self,
        position: &Position,
        namespace: Option<&str>,
        local_name: &str,
    ) -> Option<(Position, Label<'s>)> {
        let mut label: Option<Label<'s>> = None;
        let mut next = BTreeSet::new();
        for &state in position {
            for (candidate, target) in &self.states[state].edges {
                if !candidate.matches(namespace, local_name) {
                    continue;
                }
                next.insert(*target);
                label = match (label, candidate) {
                    (None, _) | (Some(Label::Any(_)), Label::Element(_)) => Some(*candidate),
                    (kept, _) => kept,
                };
            }
        }
        label.map(|label| (self.close(next), label))
    }

    /// True if the children matched so far form complete content
    pub fn is_final(&self, position: &Position) -> bool {
        position.contains(&self.accept)
    }

    /// Names that may follow at `position`, for error reports
    pub fn expected(&self, position: &Position) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for &state in position {
            for (label, _) in &self.states[state].edges {
                let name = label.describe();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::QName;
    use crate::validators::particles::{ModelGroup, Occurs};

    fn element(name: &str, min: u32, max: Option<u32>) -> Particle {
        Particle {
            occurs: Occurs::new(min, max),
            term: Term::Element(Box::new(ElementDecl {
                name: QName::local(name),
                type_id: 0,
                nillable: false,
                default: None,
                fixed: None,
            })),
        }
    }

    fn group(compositor: Compositor, occurs: Occurs, particles: Vec<Particle>) -> Particle {
        Particle {
            occurs,
            term: Term::Group(ModelGroup {
                compositor,
                particles,
            }),
        }
    }

    fn accepts(particle: &Particle, children: &[&str]) -> bool {
        let model = ContentModel::new(particle);
        let mut position = model.start();
        for child in children {
            match model.advance(&position, None, child) {
                Some((next, _)) => position = next,
                None => return false,
            }
        }
        model.is_final(&position)
    }

    #[test]
    fn test_sequence() {
        let particle = group(
            Compositor::Sequence,
            Occurs::once(),
            vec![element("a", 1, Some(1)), element("b", 0, Some(1)), element("c", 1, None)],
        );
        assert!(accepts(&particle, &["a", "c"]));
        assert!(accepts(&particle, &["a", "b", "c", "c", "c"]));
        assert!(!accepts(&particle, &["a"]));
        assert!(!accepts(&particle, &["b", "c"]));
        assert!(!accepts(&particle, &["a", "c", "b"]));
    }

    #[test]
    fn test_repeated_choice() {
        let particle = group(
            Compositor::Choice,
            Occurs::new(1, Some(3)),
            vec![element("x", 1, Some(1)), element("y", 1, Some(1))],
        );
        assert!(accepts(&particle, &["y"]));
        assert!(accepts(&particle, &["x", "y", "x"]));
        assert!(!accepts(&particle, &[]));
        assert!(!accepts(&particle, &["x", "x", "x", "x"]));
    }

    #[test]
    fn test_nested_optional_groups() {
        let inner = group(
            Compositor::Sequence,
            Occurs::new(0, None),
            vec![element("k", 1, Some(1)), element("v", 1, Some(1))],
        );
        let particle = group(
            Compositor::Sequence,
            Occurs::once(),
            vec![element("head", 1, Some(1)), inner],
        );
        assert!(accepts(&particle, &["head"]));
        assert!(accepts(&particle, &["head", "k", "v", "k", "v"]));
        assert!(!accepts(&particle, &["head", "k"]));
    }

    #[test]
    fn test_expected_names() {
        let particle = group(
            Compositor::Sequence,
            Occurs::once(),
            vec![element("a", 0, Some(1)), element("b", 1, Some(1))],
        );
        let model = ContentModel::new(&particle);
        assert_eq!(model.expected(&model.start()), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_large_max_occurs_is_not_unrolled_forever() {
        let particle = element("item", 0, Some(100_000));
        let children: Vec<&str> = std::iter::repeat("item").take(500).collect();
        assert!(accepts(&particle, &children));
    }
}
