//! Iterative optimization controller.
//!
//! The controller drives the engine through a state machine:
//!
//! ```text
//! Start -> StartLoop -> Solve -> { Sat | Unsat | Unknown } -> EndLoop -> StartLoop ...
//! ```
//!
//! Every model found is made the incumbent: an improvement constraint,
//! guarded by a volatile external, forces the next model to be strictly
//! better. When no better model exists the incumbent is optimal; its
//! externals are released, ties are optionally enumerated, and the search
//! continues for further optima until `max_models` is reached or the engine
//! proves there are none.

pub mod context;
pub mod externals;
pub mod programs;
pub mod state;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{MetaMode, RunConfig, SolvingMode};
use crate::engine::{Model, ProgramPart, SolveOutcome, SolvingEngine};
use crate::error::{ConfigResult, ControlError, ControlResult};
use crate::meta::{MetaProgramBuilder, MetaSetup};
use crate::term::Term;

use self::context::LibraryContext;
use self::externals::VolatileExternals;
use self::programs::{ControlNames, AUXILIARY_PROGRAMS};
use self::state::{IterationState, RunState};

/// States of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    StartLoop,
    Solve,
    Sat,
    Unsat,
    Unknown,
    EndLoop,
}

/// Result of one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue(Phase),
    Terminate(RunOutcome),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// At least one optimum was found.
    Optimal,
    /// The base program has no models.
    Unsatisfiable,
    /// The engine failed; the run stopped at that point.
    EngineFailure { message: String },
    /// Stopped through an [`AbortHandle`].
    Interrupted,
}

/// Why an answer was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// An improving model that was later beaten.
    Candidate,
    /// An optimal model.
    Optimum,
    /// A model equally preferred to an optimum.
    Tie,
}

/// One reported model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub number: u64,
    pub shown: Vec<Term>,
    pub kind: AnswerKind,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Answer: {}", self.number)?;
        let symbols: Vec<String> = self.shown.iter().map(display_symbol).collect();
        write!(f, "{}", symbols.join(" "))?;
        match self.kind {
            AnswerKind::Candidate => Ok(()),
            AnswerKind::Optimum => write!(f, "\nOPTIMUM FOUND"),
            AnswerKind::Tie => write!(f, "\nOPTIMUM FOUND *"),
        }
    }
}

/// Constraint-variable assignments are shown as `x=v`.
fn display_symbol(symbol: &Term) -> String {
    match symbol.arguments() {
        [var, value] if symbol.name() == Some("$") => format!("{var}={value}"),
        _ => symbol.to_string(),
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub answers: Vec<Answer>,
    pub models: u64,
    pub optimal_models: u64,
    /// Whether further optima may exist.
    pub more_models: bool,
    pub steps: u32,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn optima(&self) -> impl Iterator<Item = &Answer> {
        self.answers
            .iter()
            .filter(|a| matches!(a.kind, AnswerKind::Optimum | AnswerKind::Tie))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for answer in &self.answers {
            writeln!(f, "{answer}")?;
        }
        match &self.outcome {
            RunOutcome::Unsatisfiable => writeln!(f, "UNSATISFIABLE")?,
            RunOutcome::EngineFailure { message } => writeln!(f, "ERROR (engine): {message}")?,
            RunOutcome::Interrupted => writeln!(f, "INTERRUPTED")?,
            RunOutcome::Optimal => {}
        }
        writeln!(f)?;
        let more = if self.more_models { "+" } else { "" };
        writeln!(f, "Models       : {}{more}", self.models)?;
        let optimum = match (&self.outcome, self.optimal_models) {
            (RunOutcome::Unsatisfiable, _) => "unsatisfiable",
            (_, 0) => "unknown",
            _ => "yes",
        };
        writeln!(f, "  Optimum    : {optimum}")?;
        writeln!(f, "  Optimal    : {}", self.optimal_models)?;
        writeln!(f, "Steps        : {}", self.steps)?;
        write!(f, "Time         : {:.3}s", self.elapsed.as_secs_f64())
    }
}

/// Cooperative stop signal, checked at the end of every iteration.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives one optimization run over a solving engine.
pub struct Controller<E> {
    engine: E,
    config: RunConfig,
    names: ControlNames,
    context: LibraryContext,
    externals: VolatileExternals,
    state: RunState,
    meta: Option<MetaSetup>,
    answers: Vec<Answer>,
    pending: Option<Model>,
    abort: AbortHandle,
}

impl<E: SolvingEngine> Controller<E> {
    pub fn new(engine: E, config: RunConfig) -> ConfigResult<Self> {
        config.validate()?;
        let names = ControlNames::new(config.namespace.clone());
        Ok(Self {
            engine,
            externals: VolatileExternals::new(names.clone()),
            names,
            config,
            context: LibraryContext::default(),
            state: RunState::new(),
            meta: None,
            answers: Vec::new(),
            pending: None,
            abort: AbortHandle::default(),
        })
    }

    /// Atoms whose truth the preference programs compare.
    pub fn with_holds_domain(mut self, domain: Vec<Term>) -> Self {
        self.context.set_holds_domain(domain);
        self
    }

    /// Build and ground a preference meta program at start.
    pub fn with_meta(mut self, setup: MetaSetup) -> Self {
        self.meta = Some(setup);
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn externals(&self) -> &VolatileExternals {
        &self.externals
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Run to completion. Engine failures end the run with
    /// [`RunOutcome::EngineFailure`]; other errors are returned.
    pub fn run(&mut self) -> ControlResult<RunReport> {
        let started = Instant::now();
        let mut phase = Phase::Start;
        let outcome = loop {
            tracing::debug!(?phase, step = self.state.step, "phase");
            match self.advance(phase) {
                Ok(Flow::Continue(next)) => phase = next,
                Ok(Flow::Terminate(outcome)) => break outcome,
                Err(ControlError::Engine(err)) => {
                    tracing::error!(error = %err, step = self.state.step, "engine failure");
                    break RunOutcome::EngineFailure {
                        message: err.to_string(),
                    };
                }
                Err(err) => return Err(err),
            }
        };

        let report = RunReport {
            outcome,
            answers: std::mem::take(&mut self.answers),
            models: self.state.models(),
            optimal_models: self.state.opt_models(),
            more_models: self.state.more_models(),
            steps: self.state.step,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            models = report.models,
            optimal = report.optimal_models,
            more = report.more_models,
            steps = report.steps,
            "run finished"
        );
        Ok(report)
    }

    /// Execute one phase and report where to go next.
    pub fn advance(&mut self, phase: Phase) -> ControlResult<Flow> {
        match phase {
            Phase::Start => self.start(),
            Phase::StartLoop => self.start_loop(),
            Phase::Solve => self.solve(),
            Phase::Sat => self.sat(),
            Phase::Unsat => self.unsat(),
            Phase::Unknown => Ok(Flow::Continue(Phase::EndLoop)),
            Phase::EndLoop => Ok(if self.abort.is_aborted() {
                tracing::info!(step = self.state.step, "run aborted");
                Flow::Terminate(RunOutcome::Interrupted)
            } else {
                Flow::Continue(Phase::StartLoop)
            }),
        }
    }

    fn ground(&mut self, parts: &[ProgramPart]) -> ControlResult<()> {
        tracing::debug!(
            parts = %parts.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "),
            "grounding"
        );
        self.engine.ground(parts, &mut self.context)?;
        Ok(())
    }

    fn start(&mut self) -> ControlResult<Flow> {
        let ns = self.names.namespace().to_string();
        for program in AUXILIARY_PROGRAMS {
            self.engine
                .add(program.name, program.params, &program.render(&ns))?;
        }
        self.ground(&[ProgramPart::nullary(programs::DO_HOLDS_AT_ZERO)])?;
        self.ground(&[ProgramPart::nullary(programs::PREFERENCE_BASE)])?;
        if self.config.mode == SolvingMode::Approx {
            self.ground(&[ProgramPart::nullary(programs::APPROX)])?;
            self.state.approx_active = true;
        }
        self.check_errors()?;
        self.ground_meta_program()?;

        self.state.step = 0;
        self.engine.set_model_limit(1);
        tracing::info!(
            mode = %self.config.mode,
            max_models = self.config.max_models,
            namespace = %ns,
            "solving"
        );
        Ok(Flow::Continue(Phase::StartLoop))
    }

    /// Fail on `_error/1` atoms left by the preference compiler.
    fn check_errors(&self) -> ControlResult<()> {
        let errors = self
            .engine
            .atoms_by_signature(&self.names.name(programs::ERROR), 1);
        if errors.is_empty() {
            return Ok(());
        }
        let mut messages = String::new();
        for atom in &errors {
            let message = error_message(&atom.arguments()[0]);
            tracing::error!(%message, "preference specification error");
            messages.push('\n');
            messages.push_str(&message);
        }
        Err(ControlError::Specification { messages })
    }

    fn ground_meta_program(&mut self) -> ControlResult<()> {
        if self.config.meta == MetaMode::Off {
            return Ok(());
        }
        let Some(mut setup) = self.meta.take() else {
            tracing::warn!(meta = %self.config.meta, "no meta program setup, skipped");
            return Ok(());
        };
        if !setup.matches(self.config.meta) {
            tracing::warn!(meta = %self.config.meta, "meta setup does not match the configured mode");
        }
        let builder = MetaProgramBuilder::new(self.names.namespace(), &setup.source);
        let domain = self.context.holds_domain().to_vec();
        let program = builder.build(
            &self.engine,
            setup.reifier.as_mut(),
            &mut self.context,
            &setup.observed_base,
            &domain,
        )?;
        self.engine.add(programs::METASP, &[], &program)?;
        self.ground(&[ProgramPart::nullary(programs::METASP)])
    }

    fn start_loop(&mut self) -> ControlResult<Flow> {
        self.state.step += 1;
        if self.config.checker {
            self.ground(&[programs::open_holds(self.state.step)])?;
        }
        Ok(Flow::Continue(Phase::Solve))
    }

    fn solve(&mut self) -> ControlResult<Flow> {
        let mut assumptions = Vec::new();
        if self.state.approx_active {
            assumptions.push((self.names.approx(), true));
        }
        let mut last = None;
        let outcome = self
            .engine
            .solve(&assumptions, &mut |model: &Model| last = Some(model.clone()))?;
        Ok(Flow::Continue(match outcome {
            SolveOutcome::Satisfiable => {
                self.pending = last;
                Phase::Sat
            }
            SolveOutcome::Unsatisfiable => Phase::Unsat,
            SolveOutcome::Unknown => Phase::Unknown,
        }))
    }

    fn sat(&mut self) -> ControlResult<Flow> {
        let step = self.state.step;
        let model = self.pending.take().unwrap_or_default();
        let snapshot = IterationState::capture(step, &model, &self.names);
        self.state.record_model(snapshot);
        self.state.check_last_model()?;

        let current = &self.state.current;
        self.context.set_model(&current.holds, &current.nholds);
        self.answers.push(Answer {
            number: current.models,
            shown: current.shown.clone(),
            kind: AnswerKind::Candidate,
        });
        tracing::info!(step, models = current.models, "model found");

        self.ground(&[
            programs::do_holds(step),
            programs::preference(0, step),
            programs::not_unsat(0, step),
            programs::volatile_external(0, step),
        ])?;
        self.externals.activate(&mut self.engine, 0, step)?;
        self.state.improving.push(step);
        self.state.since_optimum = false;
        Ok(Flow::Continue(Phase::EndLoop))
    }

    fn unsat(&mut self) -> ControlResult<Flow> {
        if self.state.approx_active {
            self.state.approx_active = false;
            tracing::info!(step = self.state.step, "approximation exhausted, switching to exact");
            return Ok(Flow::Continue(Phase::Solve));
        }
        if self.state.models() == 0 {
            self.state.set_more_models(false);
            tracing::info!("UNSATISFIABLE");
            return Ok(Flow::Terminate(RunOutcome::Unsatisfiable));
        }
        if self.state.since_optimum {
            self.state.set_more_models(false);
            return Ok(Flow::Terminate(RunOutcome::Optimal));
        }

        self.state.count_optimum();
        if let Some(last) = self.answers.last_mut() {
            last.kind = AnswerKind::Optimum;
        }
        tracing::info!(
            step = self.state.current.step,
            optimal = self.state.opt_models(),
            "OPTIMUM FOUND"
        );
        self.relax_improving()?;
        if self.config.enumerate_ties {
            self.enumerate_ties()?;
        }
        if self.limit_reached() {
            return Ok(Flow::Terminate(RunOutcome::Optimal));
        }

        let prev = self.state.current.step;
        self.ground(&[
            programs::preference(prev, 0),
            programs::unsat(prev, 0),
            ProgramPart::nullary(programs::DELETE_MODEL),
            programs::volatile_fact(prev, 0),
        ])?;
        self.state.since_optimum = true;
        Ok(Flow::Continue(Phase::EndLoop))
    }

    fn limit_reached(&self) -> bool {
        self.config.max_models != 0 && self.state.opt_models() >= self.config.max_models
    }

    /// Release every improvement constraint of the current optimum.
    fn relax_improving(&mut self) -> ControlResult<()> {
        for step in std::mem::take(&mut self.state.improving) {
            self.externals.release(&mut self.engine, 0, step)?;
        }
        Ok(())
    }

    /// Report the models that agree with the optimum on the holds domain.
    fn enumerate_ties(&mut self) -> ControlResult<()> {
        let remaining = match self.config.max_models {
            0 => None,
            max => Some(max.saturating_sub(self.state.opt_models())),
        };
        if remaining == Some(0) {
            return Ok(());
        }

        let current = &self.state.current;
        let mut assumptions: Vec<(Term, bool)> = current
            .holds
            .iter()
            .map(|x| (self.names.holds(x.clone(), 0), true))
            .collect();
        assumptions.extend(
            current
                .nholds
                .iter()
                .map(|x| (self.names.holds(x.clone(), 0), false)),
        );
        let optimum = visible(&self.names, &current.shown);

        // One more model than needed: the optimum itself comes back as well.
        let old_limit = self.engine.model_limit();
        self.engine.set_model_limit(remaining.map_or(0, |r| r + 1));

        let names = &self.names;
        let mut skipped_optimum = false;
        let mut ties: Vec<Vec<Term>> = Vec::new();
        let result = self.engine.solve(&assumptions, &mut |model: &Model| {
            let shown: Vec<Term> = model
                .shown
                .iter()
                .filter(|t| !names.is_holds_at_zero(t))
                .cloned()
                .collect();
            if !skipped_optimum && visible(names, &shown) == optimum {
                skipped_optimum = true;
                return;
            }
            ties.push(shown);
        });
        self.engine.set_model_limit(old_limit);
        result?;

        if let Some(r) = remaining {
            ties.truncate(usize::try_from(r).unwrap_or(usize::MAX));
        }
        for shown in ties {
            let number = self.state.count_tie();
            self.answers.push(Answer {
                number,
                shown,
                kind: AnswerKind::Tie,
            });
            tracing::info!(models = number, "OPTIMUM FOUND *");
        }
        Ok(())
    }
}

/// Shown symbols outside the control namespace, sorted.
fn visible(names: &ControlNames, shown: &[Term]) -> Vec<Term> {
    let mut v: Vec<Term> = shown
        .iter()
        .filter(|t| !names.is_internal(t))
        .cloned()
        .collect();
    v.sort();
    v
}

/// Message of an `_error/1` atom: the argument's elements, unquoted.
fn error_message(argument: &Term) -> String {
    match argument {
        Term::Function { args, .. } if !args.is_empty() => args
            .iter()
            .map(|a| a.to_string().replace('"', ""))
            .collect(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_concatenate_unquoted() {
        let arg = Term::tuple(vec![
            Term::String("unknown preference type ".into()),
            Term::constant("foo"),
        ]);
        assert_eq!(error_message(&arg), "unknown preference type foo");
        assert_eq!(error_message(&Term::constant("bad")), "bad");
    }

    #[test]
    fn answers_render_like_the_solver_output() {
        let answer = Answer {
            number: 2,
            shown: vec![
                Term::constant("a"),
                Term::function("$", vec![Term::constant("x"), Term::Number(3)]),
            ],
            kind: AnswerKind::Tie,
        };
        assert_eq!(answer.to_string(), "Answer: 2\na x=3\nOPTIMUM FOUND *");
    }

    #[test]
    fn abort_handle_is_shared() {
        let handle = AbortHandle::default();
        let clone = handle.clone();
        clone.abort();
        assert!(handle.is_aborted());
    }

    #[test]
    fn report_statistics() {
        let report = RunReport {
            outcome: RunOutcome::Optimal,
            answers: Vec::new(),
            models: 3,
            optimal_models: 1,
            more_models: true,
            steps: 4,
            elapsed: Duration::from_millis(1500),
        };
        let text = report.to_string();
        assert!(text.contains("Models       : 3+"));
        assert!(text.contains("Optimum    : yes"));
        assert!(text.contains("Time         : 1.500s"));
    }
}
