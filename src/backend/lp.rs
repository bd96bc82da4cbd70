//! CPLEX LP rendering of a finite-domain model for MIP solvers.
//!
//! Integer variables keep their domains as bounds. Every non-linear
//! constraint is linearised over one-hot indicators `{var}_is_{value}`,
//! created on first use and tied to the variable by a channel row pair:
//!
//! - `sum(var_is_v) = 1`
//! - `var - sum(v * var_is_v) = 0`
//!
//! Path sums get arc binaries per step whose marginals match the indicators of
//! the two endpoints; maxima and disequalities use big-M selectors.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{Comparison, FdModel, IntVar, Literal, ModelVisitor, Objective, VarId};

use super::ModelTranslator;

/// Terms per line inside a row or a declaration section
const TERMS_PER_LINE: usize = 8;

/// Writes `.lp` files
#[derive(Debug, Clone, Default)]
pub struct LpWriter;

impl LpWriter {
    pub fn new() -> Self {
        LpWriter
    }
}

impl ModelTranslator for LpWriter {
    fn extension(&self) -> &'static str {
        "lp"
    }

    fn translate(&self, model: &FdModel) -> Result<String> {
        model.validate()?;
        let mut emitter = Emitter {
            model,
            objective: String::new(),
            rows: Vec::new(),
            bounds: Vec::new(),
            generals: Vec::new(),
            binaries: Vec::new(),
            channelled: HashSet::new(),
            selectors: 0,
            needs_zero: false,
        };
        model.walk(&mut emitter);
        Ok(emitter.render())
    }
}

struct Emitter<'m> {
    model: &'m FdModel,
    objective: String,
    rows: Vec<String>,
    bounds: Vec<String>,
    generals: Vec<String>,
    binaries: Vec<String>,
    /// Variables whose indicators already exist
    channelled: HashSet<VarId>,
    /// Counter for disequality binaries
    selectors: usize,
    /// Whether a constant row needed the fixed `lp_zero` column
    needs_zero: bool,
}

/// `a x - b y + z`, with coefficients of repeated names merged and zero terms dropped.
/// Each term is one element of the returned vector.
fn terms_of(terms: &[(i64, String)]) -> Vec<String> {
    let mut merged: Vec<(i64, &str)> = Vec::new();
    for (coef, name) in terms {
        match merged.iter_mut().find(|(_, n)| *n == name.as_str()) {
            Some(entry) => entry.0 += coef,
            None => merged.push((*coef, name.as_str())),
        }
    }
    merged
        .into_iter()
        .filter(|&(coef, _)| coef != 0)
        .enumerate()
        .map(|(k, (coef, name))| {
            let sign = match (k, coef < 0) {
                (0, false) => "",
                (0, true) => "- ",
                (_, false) => "+ ",
                (_, true) => "- ",
            };
            match coef.abs() {
                1 => format!("{}{}", sign, name),
                c => format!("{}{} {}", sign, c, name),
            }
        })
        .collect()
}

fn wrap(parts: &[String], indent: &str) -> String {
    parts
        .chunks(TERMS_PER_LINE)
        .map(|chunk| chunk.join(" "))
        .collect::<Vec<_>>()
        .join(&format!("\n{}", indent))
}

fn value_tag(value: i64) -> String {
    if value < 0 {
        format!("m{}", -(value as i128))
    } else {
        value.to_string()
    }
}

impl<'m> Emitter<'m> {
    fn var(&self, id: VarId) -> &'m IntVar {
        self.model.var(id)
    }

    fn name(&self, id: VarId) -> String {
        self.var(id).name.clone()
    }

    /// Adds `terms <cmp> rhs`; `Ne` is split by [`Self::not_equal`].
    fn row(&mut self, terms: &[(i64, String)], cmp: Comparison, rhs: i64) {
        let (sense, rhs) = match cmp {
            Comparison::Eq => ("=", rhs),
            Comparison::Le => ("<=", rhs),
            Comparison::Lt => ("<=", rhs - 1),
            Comparison::Ge => (">=", rhs),
            Comparison::Gt => (">=", rhs + 1),
            Comparison::Ne => return self.not_equal(terms, rhs),
        };
        let mut parts = terms_of(terms);
        if parts.is_empty() {
            let holds = match sense {
                "=" => rhs == 0,
                "<=" => 0 <= rhs,
                _ => 0 >= rhs,
            };
            if holds {
                return;
            }
            // 0 <sense> rhs is false, keep the infeasibility visible
            self.needs_zero = true;
            parts.push("lp_zero".to_string());
        }
        let label = format!("c{}", self.rows.len() + 1);
        let indent = " ".repeat(label.len() + 3);
        self.rows.push(format!(" {}: {} {} {}", label, wrap(&parts, &indent), sense, rhs));
    }

    /// `terms != rhs` as `terms <= rhs - 1` or `terms >= rhs + 1`, chosen by a binary.
    fn not_equal(&mut self, terms: &[(i64, String)], rhs: i64) {
        let (lo, hi) = terms.iter().fold((0i64, 0i64), |(lo, hi), (coef, name)| {
            let var = self
                .model
                .var_by_name(name)
                .map(|id| self.var(id))
                .map(|v| (v.min, v.max))
                .unwrap_or((0, 1));
            let (a, b) = (coef * var.0, coef * var.1);
            (lo + a.min(b), hi + a.max(b))
        });
        let above = format!("ne_{}", self.selectors);
        self.selectors += 1;
        self.binaries.push(above.clone());

        let slack_below = (hi - (rhs - 1)).max(0);
        let slack_above = (rhs + 1 - lo).max(0);
        let mut below_terms = terms.to_vec();
        below_terms.push((-slack_below, above.clone()));
        self.row(&below_terms, Comparison::Le, rhs - 1);
        let mut above_terms = terms.to_vec();
        above_terms.push((-slack_above, above));
        self.row(&above_terms, Comparison::Ge, rhs + 1 - slack_above);
    }

    fn indicator_name(&self, id: VarId, value: i64) -> String {
        format!("{}_is_{}", self.var(id).name, value_tag(value))
    }

    /// Creates the one-hot indicators of `id` and their channel rows once.
    fn channel(&mut self, id: VarId) {
        if !self.channelled.insert(id) {
            return;
        }
        let var = self.var(id);
        let indicators: Vec<(i64, String)> = (var.min..=var.max)
            .map(|v| (v, self.indicator_name(id, v)))
            .collect();
        self.binaries.extend(indicators.iter().map(|(_, b)| b.clone()));

        let one_hot: Vec<(i64, String)> = indicators.iter().map(|(_, b)| (1, b.clone())).collect();
        self.row(&one_hot, Comparison::Eq, 1);

        let mut value = vec![(1, var.name.clone())];
        value.extend(indicators.into_iter().map(|(v, b)| (-v, b)));
        self.row(&value, Comparison::Eq, 0);
    }

    fn indicator(&mut self, id: VarId, value: i64) -> Option<String> {
        if !self.var(id).contains(value) {
            return None;
        }
        self.channel(id);
        Some(self.indicator_name(id, value))
    }

    /// Sum of the indicators of the values that satisfy `lit`, times `sign`
    fn truth(&mut self, lit: &Literal, sign: i64) -> Vec<(i64, String)> {
        self.channel(lit.var);
        let var = self.var(lit.var);
        (var.min..=var.max)
            .filter(|&v| lit.holds(v))
            .map(|v| (sign, self.indicator_name(lit.var, v)))
            .collect()
    }

    /// `sum(f(v) * var_is_v)`, times `sign`
    fn weighted<F: Fn(i64) -> i64>(&mut self, id: VarId, sign: i64, f: F) -> Vec<(i64, String)> {
        self.channel(id);
        let var = self.var(id);
        (var.min..=var.max)
            .map(|v| (sign * f(v), self.indicator_name(id, v)))
            .collect()
    }

    fn render(self) -> String {
        let mut out = String::new();
        out.push_str(&format!("\\ {}\n", self.model.name));
        out.push_str("Minimize\n");
        out.push_str(&format!(" obj: {}\n", self.objective));
        out.push_str("Subject To\n");
        for row in &self.rows {
            out.push_str(row);
            out.push('\n');
        }
        out.push_str("Bounds\n");
        for bound in &self.bounds {
            out.push_str(bound);
            out.push('\n');
        }
        if self.needs_zero {
            out.push_str(" lp_zero = 0\n");
        }
        if !self.generals.is_empty() {
            out.push_str(&format!("General\n {}\n", wrap(&self.generals, " ")));
        }
        if !self.binaries.is_empty() {
            out.push_str(&format!("Binary\n {}\n", wrap(&self.binaries, " ")));
        }
        out.push_str("End\n");
        out
    }
}

impl<'m> ModelVisitor for Emitter<'m> {
    fn visit_var(&mut self, _id: VarId, var: &IntVar) {
        let bound = if var.is_fixed() {
            format!(" {} = {}", var.name, var.min)
        } else {
            format!(" {} <= {} <= {}", var.min, var.name, var.max)
        };
        self.bounds.push(bound);
        self.generals.push(var.name.clone());
    }

    fn visit_linear(&mut self, terms: &[(i64, VarId)], cmp: Comparison, rhs: i64) {
        let terms: Vec<(i64, String)> = terms.iter().map(|&(coef, var)| (coef, self.name(var))).collect();
        self.row(&terms, cmp, rhs);
    }

    fn visit_implication(&mut self, premise: &Literal, conclusion: &Literal) {
        let mut terms = self.truth(premise, 1);
        terms.extend(self.truth(conclusion, -1));
        self.row(&terms, Comparison::Le, 0);
    }

    fn visit_exactly_one(&mut self, vars: &[VarId], value: i64) {
        let terms: Vec<(i64, String)> = vars
            .iter()
            .filter_map(|&var| self.indicator(var, value))
            .map(|b| (1, b))
            .collect();
        self.row(&terms, Comparison::Eq, 1);
    }

    fn visit_element_sum(&mut self, target: VarId, table: &Arc<Vec<i64>>, indices: &[VarId]) {
        let mut terms = vec![(1, self.name(target))];
        for &index in indices {
            terms.extend(self.weighted(index, -1, |v| table[v as usize]));
        }
        self.row(&terms, Comparison::Eq, 0);
    }

    fn visit_path_sum(&mut self, target: VarId, matrix: &Arc<Vec<Vec<i64>>>, path: &[VarId]) {
        let target_name = self.name(target);
        let mut total = vec![(1, target_name.clone())];
        for (k, step) in path.windows(2).enumerate() {
            let (from, to) = (self.var(step[0]), self.var(step[1]));
            let arc = |u: i64, v: i64| format!("{}_arc_{}_{}_{}", target_name, k, u, v);

            for u in from.min..=from.max {
                let mut out_flow: Vec<(i64, String)> = (to.min..=to.max).map(|v| (1, arc(u, v))).collect();
                out_flow.extend(self.indicator(step[0], u).map(|b| (-1, b)));
                self.row(&out_flow, Comparison::Eq, 0);
            }
            for v in to.min..=to.max {
                let mut in_flow: Vec<(i64, String)> = (from.min..=from.max).map(|u| (1, arc(u, v))).collect();
                in_flow.extend(self.indicator(step[1], v).map(|b| (-1, b)));
                self.row(&in_flow, Comparison::Eq, 0);
            }
            for u in from.min..=from.max {
                for v in to.min..=to.max {
                    self.binaries.push(arc(u, v));
                    total.push((-matrix[u as usize][v as usize], arc(u, v)));
                }
            }
        }
        self.row(&total, Comparison::Eq, 0);
    }

    fn visit_maximum(&mut self, target: VarId, args: &[VarId]) {
        let target_var = self.var(target);
        let selectors: Vec<String> = (0..args.len())
            .map(|i| format!("{}_sel_{}", target_var.name, i))
            .collect();
        for &arg in args {
            self.row(&[(1, target_var.name.clone()), (-1, self.name(arg))], Comparison::Ge, 0);
        }
        let pick: Vec<(i64, String)> = selectors.iter().map(|s| (1, s.clone())).collect();
        self.row(&pick, Comparison::Eq, 1);
        for (&arg, selector) in args.iter().zip(&selectors) {
            let big_m = (target_var.max - self.var(arg).min).max(0);
            let terms = [
                (1, target_var.name.clone()),
                (-1, self.name(arg)),
                (big_m, selector.clone()),
            ];
            self.row(&terms, Comparison::Le, big_m);
        }
        self.binaries.extend(selectors);
    }

    fn visit_sentinel_le(&mut self, lhs: VarId, rhs: VarId, sentinel: i64, substitute: i64) {
        let key = move |v: i64| if v == sentinel { substitute } else { v };
        let mut terms = self.weighted(lhs, 1, key);
        terms.extend(self.weighted(rhs, -1, key));
        self.row(&terms, Comparison::Le, 0);
    }

    fn visit_objective(&mut self, objective: &Objective) {
        match objective {
            Objective::Minimize(var) => self.objective = self.name(*var),
        }
    }
}
