//! Reification: in-process compilation against reifier output.

mod common;

use common::{
    observe_choice_negation_sum, observe_loop, LoopGrounder, CHOICE_NEGATION_SUM_REIFIED,
    CLINGO_LOOP_REIFIED,
};

use qualopt::engine::NoContext;
use qualopt::program::ObservedProgram;
use qualopt::reify::canonical::{canonical_facts, parse_program};
use qualopt::reify::observed::InProcessReifier;
use qualopt::reify::{compile, OutputDialect, Reifier};

fn loop_program() -> ObservedProgram {
    let mut program = ObservedProgram::new();
    observe_loop(&mut program);
    program
}

fn choice_negation_sum() -> ObservedProgram {
    let mut program = ObservedProgram::new();
    observe_choice_negation_sum(&mut program);
    program
}

#[test]
fn compile_is_deterministic() {
    let program = loop_program();
    let first = compile(&program, "__");
    let second = compile(&program, "__");
    assert_eq!(first.as_str(), second.as_str());
}

#[test]
fn compile_agrees_with_reifier_output() {
    let ours = canonical_facts(compile(&loop_program(), "").facts(), "", OutputDialect::Atom);
    let theirs = canonical_facts(CLINGO_LOOP_REIFIED, "", OutputDialect::LiteralTuple);
    assert_eq!(ours, theirs);
}

#[test]
fn choice_heads_negation_and_sums_agree_with_reifier_output() {
    let ours = canonical_facts(
        compile(&choice_negation_sum(), "_").facts(),
        "_",
        OutputDialect::Atom,
    );
    let theirs = canonical_facts(CHOICE_NEGATION_SUM_REIFIED, "", OutputDialect::LiteralTuple);
    assert_eq!(ours, theirs);

    assert!(ours.contains("rule(choice({a;b}),normal({}))"));
    assert!(ours.contains("rule(disjunction({c}),normal({not a}))"));
    assert!(ours.contains("rule(disjunction({d}),sum({1:a;2:b},1))"));
    assert!(!ours.iter().any(|f| f.starts_with("scc(")));
}

#[test]
fn reifier_output_rebuilds_the_ground_program() {
    let rebuilt = parse_program(CHOICE_NEGATION_SUM_REIFIED, "", OutputDialect::LiteralTuple);
    let original = choice_negation_sum();
    assert_eq!(rebuilt.rules, original.rules);
    assert_eq!(rebuilt.weighted_rules, original.weighted_rules);

    let recompiled = canonical_facts(compile(&rebuilt, "__").facts(), "__", OutputDialect::Atom);
    let direct = canonical_facts(compile(&original, "__").facts(), "__", OutputDialect::Atom);
    assert_eq!(recompiled, direct);
}

#[test]
fn in_process_reifier_uses_the_observed_statements() {
    let mut reifier = InProcessReifier::new(LoopGrounder);
    assert_eq!(reifier.dialect(), OutputDialect::Atom);

    let base = reifier.reify("ignored", &mut NoContext, "___").unwrap();
    assert_eq!(base.prefix(), "___");
    assert!(base.facts().starts_with("___rule(disjunction(0),normal(0))."));
    assert!(base.facts().contains("___scc(0,1)."));
    assert_eq!(base.facts(), compile(&loop_program(), "___").facts());
}

#[cfg(unix)]
mod stub_binary {
    use qualopt::error::ReifyError;
    use qualopt::reify::canonical::canonical_facts;
    use qualopt::reify::external::ExternalReifier;
    use qualopt::reify::{compile, OutputDialect};

    use super::common::{
        print_facts, stub_inputs, stub_reifier, CHOICE_NEGATION_SUM_REIFIED, CLINGO_LOOP_REIFIED,
    };
    use super::{choice_negation_sum, loop_program};

    #[test]
    fn stub_output_is_prefixed_line_by_line() {
        let dir = tempfile::tempdir().unwrap();
        let command = stub_reifier(dir.path(), "5.4.0", &print_facts(CLINGO_LOOP_REIFIED));
        let reifier = ExternalReifier::new(command).unwrap();
        assert_eq!(reifier.version(), (5, 4));

        let program = "a :- b. b :- a. b :- c. a :- c. {c}.";
        let base = reifier.reify_text(program, "__").unwrap();
        assert_eq!(base.dialect(), OutputDialect::LiteralTuple);
        for line in base.facts().lines().filter(|l| !l.is_empty()) {
            assert!(line.starts_with("__"), "unprefixed line: {line}");
        }
        assert!(base.facts().contains("__scc(0,2)."));
        assert!(stub_inputs(dir.path()).contains(program));

        let ours = canonical_facts(compile(&loop_program(), "__").facts(), "__", OutputDialect::Atom);
        let theirs = canonical_facts(base.facts(), "__", OutputDialect::LiteralTuple);
        assert_eq!(ours, theirs);
    }

    #[test]
    fn negative_literals_survive_prefixing() {
        let dir = tempfile::tempdir().unwrap();
        let command = stub_reifier(dir.path(), "5.6.2", &print_facts(CHOICE_NEGATION_SUM_REIFIED));
        let reifier = ExternalReifier::new(command).unwrap();

        let base = reifier
            .reify_text("{a;b}. c :- not a. d :- 1 #sum{1:a;2:b}.", "_")
            .unwrap();
        assert!(base.facts().contains("_literal_tuple(1,-1)."));
        assert!(base.facts().contains("_weighted_literal_tuple(0,2,2)."));

        let ours = canonical_facts(
            compile(&choice_negation_sum(), "_").facts(),
            "_",
            OutputDialect::Atom,
        );
        let theirs = canonical_facts(base.facts(), "_", OutputDialect::LiteralTuple);
        assert_eq!(ours, theirs);
    }

    #[test]
    fn rejected_program_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let command = stub_reifier(
            dir.path(),
            "5.6.2",
            "echo '<block>:1:6-7: error: syntax error, unexpected .' >&2\nexit 65",
        );
        let reifier = ExternalReifier::new(command).unwrap();

        match reifier.reify_text("a :- .", "__").unwrap_err() {
            ReifyError::ReifierFailed { status, stderr, .. } => {
                assert!(status.contains("65"), "{status}");
                assert!(stderr.contains("syntax error"));
            }
            other => panic!("expected a reifier failure, got {other:?}"),
        }
    }

    #[test]
    fn old_reifier_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let command = stub_reifier(dir.path(), "5.2.2", &print_facts(CLINGO_LOOP_REIFIED));
        let err = ExternalReifier::new(command).unwrap_err();
        assert!(matches!(err, ReifyError::ReifierTooOld { major: 5, minor: 2 }));
    }

    #[test]
    fn missing_reifier_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExternalReifier::new(dir.path().join("no-such-clingo")).unwrap_err();
        assert!(matches!(err, ReifyError::ReifierNotFound { .. }));
    }
}

#[test]
#[ignore = "needs a clingo binary on PATH"]
fn real_clingo_agrees_with_compile() {
    use qualopt::reify::external::ExternalReifier;

    let reifier = ExternalReifier::new("clingo").unwrap();
    let base = reifier
        .reify_text("a :- b. b :- a. b :- c. a :- c. {c}.", "_")
        .unwrap();
    let ours = canonical_facts(compile(&loop_program(), "_").facts(), "_", OutputDialect::Atom);
    let theirs = canonical_facts(base.facts(), "_", OutputDialect::LiteralTuple);
    assert_eq!(ours, theirs);
}
