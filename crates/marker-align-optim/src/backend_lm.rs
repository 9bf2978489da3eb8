//! [`NllsSolverBackend`] on top of the `levenberg-marquardt` crate.

use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use marker_align_core::Real;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};

/// Borrowed problem plus the current iterate, as the LM driver expects.
///
/// Evaluations that are non-finite or have the wrong shape are reported as
/// `None`, which makes the driver stop instead of stepping on garbage.
struct LmAdapter<'a, P: NllsProblem> {
    problem: &'a P,
    x: DVector<Real>,
}

impl<P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for LmAdapter<'_, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.x.copy_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.x.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        let r = self.problem.residuals(&self.x);
        let usable = r.len() == self.problem.num_residuals() && r.iter().all(|v| v.is_finite());
        usable.then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        let j = self.problem.jacobian(&self.x);
        let shape = (self.problem.num_residuals(), self.problem.num_params());
        let usable = j.shape() == shape && j.iter().all(|v| v.is_finite());
        usable.then_some(j)
    }
}

/// Levenberg-Marquardt backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmBackend {
    /// Initial trust region bound, as a factor of the scaled start vector norm.
    pub stepbound: Real,
}

impl Default for LmBackend {
    fn default() -> Self {
        Self { stepbound: 100.0 }
    }
}

impl NllsSolverBackend for LmBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let driver = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_stepbound(self.stepbound)
            .with_patience(opts.max_iters.max(1));

        let (solved, report) = driver.minimize(LmAdapter { problem, x: x0 });

        let summary = SolveReport {
            iterations: report.number_of_evaluations,
            final_cost: report.objective_function,
            converged: report.termination.was_successful(),
            termination: format!("{:?}", report.termination),
        };
        (solved.x, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::LmBackend;
    use crate::{NllsProblem, NllsSolverBackend, SolveOptions};
    use marker_align_core::Real;
    use nalgebra::{DMatrix, DVector};

    /// Fit a single scale factor `s` so that `s * m_i` matches `d_i`.
    struct ScaleFit {
        model: Vec<Real>,
        data: Vec<Real>,
    }

    impl NllsProblem for ScaleFit {
        fn num_params(&self) -> usize {
            1
        }

        fn num_residuals(&self) -> usize {
            self.model.len()
        }

        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_iterator(
                self.model.len(),
                self.model.iter().zip(&self.data).map(|(m, d)| d - x[0] * m),
            )
        }

        fn jacobian(&self, _x: &DVector<Real>) -> DMatrix<Real> {
            DMatrix::from_iterator(self.model.len(), 1, self.model.iter().map(|m| -m))
        }
    }

    /// Residual count disagrees with what the problem declares.
    struct Misshapen;

    impl NllsProblem for Misshapen {
        fn num_params(&self) -> usize {
            1
        }

        fn num_residuals(&self) -> usize {
            2
        }

        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_element(1, x[0])
        }

        fn jacobian(&self, _x: &DVector<Real>) -> DMatrix<Real> {
            DMatrix::from_element(1, 1, 1.0)
        }
    }

    #[test]
    fn recovers_scale_factor() {
        let problem = ScaleFit {
            model: vec![1.0, 2.0, -3.0, 0.5],
            data: vec![2.5, 5.0, -7.5, 1.25],
        };
        let (x, report) =
            LmBackend::default().solve(&problem, DVector::from_element(1, 1.0), &SolveOptions::default());

        assert!((x[0] - 2.5).abs() < 1e-8, "scale {}", x[0]);
        assert!(report.converged, "{report:?}");
        assert!(report.final_cost < 1e-12);
        assert!(report.iterations > 0);
    }

    #[test]
    fn misshapen_residuals_do_not_converge() {
        let (_, report) = LmBackend::default().solve(
            &Misshapen,
            DVector::from_element(1, 1.0),
            &SolveOptions::default(),
        );
        assert!(!report.converged, "{report:?}");
    }
}
