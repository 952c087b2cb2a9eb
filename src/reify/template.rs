//! Namespaced program fragments.
//!
//! Fixed program text (the meta-interpreter, the bindings, the control
//! programs) refers to predicates that must live in a caller-chosen
//! namespace. Such names are written with a `^` sigil in the source:
//!
//! - `^name` lives in the fragment's own namespace,
//! - `^ctl.name`, `^base.name`, `^pref.name` live in the control, meta-base
//!   and meta-preference namespaces.
//!
//! A [`Template`] is parsed once into text and name segments and rendered
//! with a [`Namespaces`] assignment. Every name is resolved independently,
//! so no namespace can capture another's substitution.

use std::fmt::Write;

/// The namespace a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Own,
    Ctl,
    Base,
    Pref,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Name { slot: Slot, name: String },
}

/// A parsed program fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

/// Prefixes for each [`Slot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    pub own: String,
    pub ctl: String,
    pub base: String,
    pub pref: String,
}

impl Namespaces {
    /// Every slot resolves to `prefix`.
    pub fn single(prefix: &str) -> Self {
        Self {
            own: prefix.to_string(),
            ctl: prefix.to_string(),
            base: prefix.to_string(),
            pref: prefix.to_string(),
        }
    }

    fn prefix(&self, slot: Slot) -> &str {
        match slot {
            Slot::Own => &self.own,
            Slot::Ctl => &self.ctl,
            Slot::Base => &self.base,
            Slot::Pref => &self.pref,
        }
    }
}

impl Template {
    /// Parse fragment source. A `^` not followed by an identifier is kept as text.
    pub fn parse(src: &str) -> Self {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut rest = src;

        while let Some(pos) = rest.find('^') {
            text.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let (slot, after_slot) = split_slot(after);
            let len = identifier_len(after_slot);
            if len == 0 {
                text.push('^');
                rest = after;
                continue;
            }
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Name {
                slot,
                name: after_slot[..len].to_string(),
            });
            rest = &after_slot[len..];
        }
        text.push_str(rest);
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Self { segments }
    }

    /// Names referenced by the fragment, in order of appearance.
    pub fn names(&self) -> impl Iterator<Item = (Slot, &str)> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Name { slot, name } => Some((*slot, name.as_str())),
            Segment::Text(_) => None,
        })
    }

    pub fn render(&self, namespaces: &Namespaces) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Name { slot, name } => {
                    let _ = write!(out, "{}{name}", namespaces.prefix(*slot));
                }
            }
        }
        out
    }

    /// Render with every slot in the same namespace.
    pub fn render_in(&self, prefix: &str) -> String {
        self.render(&Namespaces::single(prefix))
    }
}

fn split_slot(s: &str) -> (Slot, &str) {
    for (tag, slot) in [("ctl.", Slot::Ctl), ("base.", Slot::Base), ("pref.", Slot::Pref)] {
        if let Some(rest) = s.strip_prefix(tag) {
            return (slot, rest);
        }
    }
    (Slot::Own, s)
}

fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c == '_' || c.is_ascii_lowercase() => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(*c == '_' || *c == '\'' || c.is_ascii_alphanumeric()))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

// ---------------------------------------------------------------------------
// Fixed fragments
// ---------------------------------------------------------------------------

/// Meta-interpreter for reified (possibly disjunctive) programs.
///
/// Guesses an interpretation of the reified program and derives `^bot` when it
/// is not an answer set; `^bot` saturates the guess. Positive loops are checked
/// per component from the `^scc/2` facts.
pub const META_INTERPRETER: &str = r#"
^sum(B,G,T) :- ^rule(_,sum(B,G)), T = #sum { W,L : ^weighted_literal_tuple(B,L,W) }.

^supp(A,B) :- ^rule(     choice(H),B), ^atom_tuple(H,A).
^supp(A,B) :- ^rule(disjunction(H),B), ^atom_tuple(H,A).
^supp(A)   :- ^supp(A,_).

^atom(|L|) :- ^weighted_literal_tuple(_,L,_).
^atom(|L|) :- ^literal_tuple(_,L).
^atom( A ) :- ^atom_tuple(_,A).

^fact(A) :- ^rule(disjunction(H),normal(B)), ^atom_tuple(H,A), not ^literal_tuple(B,_).

^true(atom(A))                   :- ^fact(A).
^true(atom(A)) ; ^fail(atom(A))  :- ^supp(A), not ^fact(A).
                 ^fail(atom(A))  :- ^atom(A), not ^supp(A).

^true(normal(B)) :- ^literal_tuple(B),
    ^true(atom(L)) : ^literal_tuple(B, L), L > 0;
    ^fail(atom(L)) : ^literal_tuple(B,-L), L > 0.
^fail(normal(B)) :- ^literal_tuple(B, L), ^fail(atom(L)), L > 0.
^fail(normal(B)) :- ^literal_tuple(B,-L), ^true(atom(L)), L > 0.

^true(sum(B,G)) :- ^sum(B,G,T),
    #sum { W,L : ^true(atom(L)), ^weighted_literal_tuple(B, L,W), L > 0 ;
           W,L : ^fail(atom(L)), ^weighted_literal_tuple(B,-L,W), L > 0 } >= G.
^fail(sum(B,G)) :- ^sum(B,G,T),
    #sum { W,L : ^fail(atom(L)), ^weighted_literal_tuple(B, L,W), L > 0 ;
           W,L : ^true(atom(L)), ^weighted_literal_tuple(B,-L,W), L > 0 } >= T-G+1.

^bot :- ^rule(disjunction(H),B), ^true(B), ^fail(atom(A)) : ^atom_tuple(H,A).
^bot :- ^true(atom(A)), ^fail(B) : ^supp(A,B).

^internal(C,normal(B)) :- ^scc(C,A), ^supp(A,normal(B)), ^scc(C,A'), ^literal_tuple(B,A').
^internal(C,sum(B,G))  :- ^scc(C,A), ^supp(A,sum(B,G)),  ^scc(C,A'), ^weighted_literal_tuple(B,A',W).

^external(C,normal(B)) :- ^scc(C,A), ^supp(A,normal(B)), not ^internal(C,normal(B)).
^external(C,sum(B,G))  :- ^scc(C,A), ^supp(A,sum(B,G)),  not ^internal(C,sum(B,G)).

^steps(C,Z-1) :- ^scc(C,_), Z = { ^scc(C,A) : not ^fact(A) }.

^wait(C,atom(A),0)   :- ^scc(C,A), ^fail(B) : ^external(C,B).
^wait(C,normal(B),I) :- ^internal(C,normal(B)), ^fail(normal(B)), ^steps(C,Z), I = 0..Z-1.
^wait(C,normal(B),I) :- ^internal(C,normal(B)), ^literal_tuple(B,A),
                        ^wait(C,atom(A),I), ^scc(C,A), ^steps(C,Z), I < Z.
^wait(C,sum(B,G),I)  :- ^internal(C,sum(B,G)), ^steps(C,Z), I = 0..Z-1, ^sum(B,G,T),
    #sum { W,L :   ^fail(atom(L)),   ^weighted_literal_tuple(B, L,W), L > 0, not ^scc(C,L) ;
           W,L : ^wait(C,atom(L),I), ^weighted_literal_tuple(B, L,W), L > 0,     ^scc(C,L) ;
           W,L :   ^true(atom(L)),   ^weighted_literal_tuple(B,-L,W), L > 0 } >= T-G+1.
^wait(C,atom(A),I)   :- ^wait(C,atom(A),0), ^steps(C,Z), I = 1..Z,
                        ^wait(C,B,I-1) : ^supp(A,B), ^internal(C,B).

^bot :- ^scc(C,A), ^true(atom(A)), ^wait(C,atom(A),Z), ^steps(C,Z).

^true(atom(A)) :- ^supp(A), not ^fact(A), ^bot.
^fail(atom(A)) :- ^supp(A), not ^fact(A), ^bot.
"#;

/// Binds the meta-preference program to the base program through per-atom
/// output facts. Used when both reifications come from observed grounding.
pub const BINDING_BY_ATOM: &str = r#"
^pref.true(atom(A)) :-     ^ctl.holds(X,0), ^pref.output(^ctl.holds(X,1),A).
^pref.fail(atom(A)) :- not ^ctl.holds(X,0), ^pref.output(^ctl.holds(X,1),A).
^pref.true(atom(A)) :- ^base.true(atom(B)), ^base.output_term(^ctl.holds_at_zero(X),B),
                       ^pref.output(^ctl.holds(X,0),A).
^pref.fail(atom(A)) :- ^base.fail(atom(B)), ^base.output_term(^ctl.holds_at_zero(X),B),
                       ^pref.output(^ctl.holds(X,0),A).
^pref.bot :- ^base.bot.
^base.bot :- ^pref.bot.
:- not ^pref.bot.
"#;

/// Binds through literal-tuple membership. Used for reifier output, whose
/// `output/2` facts reference literal tuples instead of atoms.
pub const BINDING_BY_TUPLE: &str = r#"
^pref.true(atom(A)) :-     ^ctl.holds(X,0), ^pref.output(^ctl.holds(X,1),B), ^pref.literal_tuple(B,A).
^pref.fail(atom(A)) :- not ^ctl.holds(X,0), ^pref.output(^ctl.holds(X,1),B), ^pref.literal_tuple(B,A).
^pref.true(atom(A)) :- ^base.true(atom(B)), ^base.output(^ctl.holds(X,0),BB), ^base.literal_tuple(BB,B),
                       ^pref.output(^ctl.holds(X,0),C), ^pref.literal_tuple(C,A).
^pref.fail(atom(A)) :- ^base.fail(atom(B)), ^base.output(^ctl.holds(X,0),BB), ^base.literal_tuple(BB,B),
                       ^pref.output(^ctl.holds(X,0),C), ^pref.literal_tuple(C,A).
^pref.bot :- ^base.bot.
^base.bot :- ^pref.bot.
:- not ^pref.bot.
"#;

/// Header of the preference program that gets reified for the meta check:
/// holds atoms of both compared models are open, and the comparison must succeed.
pub const PREFERENCE_HEADER: &str = r#"
{ ^ctl.holds(X,0..1) } :- X = @get_holds_domain().
^ctl.volatile(^ctl.m(0),^ctl.m(1)).
:- ^ctl.unsat(^ctl.m(0),^ctl.m(1)).
#show ^ctl.holds/2.
#const ^ctl.m1=0.
#const ^ctl.m2=1.
"#;
