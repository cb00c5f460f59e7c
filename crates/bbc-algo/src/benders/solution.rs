//! Solve report of the Branch-and-Benders-cut engine.

use std::time::Duration;

use bbc_core::{AlternativeClass, ChoiceInstance};
use serde::Serialize;

use super::evaluate::evaluate_selection;
use super::state::{SolverCounters, SolverEvent};
use crate::mip::{MipStats, MipStatus};

/// One expanded alternative open in the reported selection.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAlternative {
    /// Expanded index
    pub index: usize,
    pub alt: usize,
    pub price: f64,
    pub class: AlternativeClass,
    /// Expected customers captured
    pub demand: f64,
    /// Expected revenue earned by the supplier
    pub revenue: f64,
}

/// Wall-clock time of every phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Timing {
    pub presolve: Duration,
    pub build: Duration,
    pub branch_and_cut: Duration,
    pub total: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct BendersSolution {
    pub status: MipStatus,
    /// Supplier profit of the selection, `-objective`
    pub profit: f64,
    pub objective: f64,
    pub best_bound: f64,
    pub gap: Option<f64>,
    pub fixed_cost: f64,
    pub revenue: f64,
    pub selection: Vec<bool>,
    pub open: Vec<OpenAlternative>,
    pub timing: Timing,
    pub counters: SolverCounters,
    pub events: Vec<SolverEvent>,
    pub mip: MipStats,
    /// Distinct presolve solutions
    pub pool_size: usize,
    pub incompatibility_cuts: usize,
    /// Draws chosen as medoids, empty without clustering
    pub medoids: Vec<usize>,
}

impl BendersSolution {
    /// Report `selection` after re-evaluating it exactly.
    pub fn from_selection(
        inst: &ChoiceInstance,
        status: MipStatus,
        selection: Vec<bool>,
        best_bound: f64,
    ) -> Self {
        let eval = evaluate_selection(inst, &selection);
        let open = selection
            .iter()
            .enumerate()
            .filter(|(_, o)| **o)
            .map(|(i, _)| {
                let e = inst.alternative(i);
                OpenAlternative {
                    index: i,
                    alt: e.alt,
                    price: e.price,
                    class: inst.class(e.alt),
                    demand: eval.demand[i],
                    revenue: eval.demand[i] * inst.revenue(i),
                }
            })
            .collect();
        let best_bound = best_bound.min(eval.cost);
        let gap = (eval.cost - best_bound).max(0.0) / eval.cost.abs().max(1e-10);
        Self {
            status,
            profit: eval.profit(),
            objective: eval.cost,
            best_bound,
            gap: Some(gap),
            fixed_cost: eval.fixed_cost,
            revenue: eval.revenue,
            selection,
            open,
            timing: Timing::default(),
            counters: SolverCounters::default(),
            events: Vec::new(),
            mip: MipStats::default(),
            pool_size: 0,
            incompatibility_cuts: 0,
            medoids: Vec::new(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == MipStatus::Optimal
    }

    /// Open supplier facilities, excluding opt-outs and competitors.
    pub fn endogenous_open(&self) -> impl Iterator<Item = &OpenAlternative> {
        self.open
            .iter()
            .filter(|o| o.class == AlternativeClass::Endogenous)
    }

    pub fn consistency_rejections(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SolverEvent::ConsistencyRejection { .. }))
            .count()
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Branch-and-Benders-cut Summary\n{}\n", "=".repeat(40)));
        s.push_str(&format!("Status: {}\n", self.status));
        s.push_str(&format!("Profit: {:.4}\n", self.profit));
        s.push_str(&format!("  Revenue: {:.4}\n", self.revenue));
        s.push_str(&format!("  Fixed cost: {:.4}\n", self.fixed_cost));
        s.push_str(&format!("Best bound: {:.4}\n", -self.best_bound));
        if let Some(gap) = self.gap {
            s.push_str(&format!("Gap: {:.4}%\n", gap * 100.0));
        }
        s.push_str(&format!(
            "Nodes: {}  LP solves: {}  Worker LPs: {}\n",
            self.mip.nodes, self.mip.lp_solves, self.counters.n_dual_subproblems
        ));
        s.push_str(&format!(
            "Cuts: {} lazy, {} user, {} presolve, {} subset\n",
            self.counters.lazy_cuts, self.counters.user_cuts, self.counters.presolve_cuts, self.counters.subset_cuts
        ));
        s.push_str(&format!(
            "Time: presolve {:.2?}, branch-and-cut {:.2?}, total {:.2?}\n",
            self.timing.presolve, self.timing.branch_and_cut, self.timing.total
        ));
        let rejections = self.consistency_rejections();
        if rejections > 0 {
            s.push_str(&format!("Consistency rejections: {}\n", rejections));
        }

        let facilities: Vec<&OpenAlternative> = self.endogenous_open().collect();
        if !facilities.is_empty() {
            s.push_str("\nOpen Facilities:\n");
            for o in facilities {
                s.push_str(&format!(
                    "  [OPEN] alt {} at price {:.2} - demand {:.2}, revenue {:.2}\n",
                    o.alt, o.price, o.demand, o.revenue
                ));
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbc_core::test_utils::toy_instance;

    #[test]
    fn report_of_toy_optimum() {
        let inst = toy_instance();
        let solution = BendersSolution::from_selection(&inst, MipStatus::Optimal, vec![true, true, true], -35.0);
        assert!((solution.profit - 35.0).abs() < 1e-9);
        assert!((solution.revenue - 40.0).abs() < 1e-9);
        assert!((solution.fixed_cost - 5.0).abs() < 1e-9);
        assert_eq!(solution.endogenous_open().count(), 2);
        assert!(solution.gap.unwrap() < 1e-12);

        let summary = solution.summary();
        assert!(summary.contains("Status: optimal"));
        assert!(summary.contains("[OPEN] alt 1"));
        assert!(summary.contains("[OPEN] alt 2"));
    }

    #[test]
    fn demand_covers_every_customer() {
        let inst = toy_instance();
        let solution = BendersSolution::from_selection(&inst, MipStatus::Feasible, vec![true, false, true], -25.0);
        let demand: f64 = solution.open.iter().map(|o| o.demand).sum();
        assert!((demand - inst.total_population()).abs() < 1e-9);
    }
}
