//! SMT-LIB 2 rendering of a finite-domain model.
//!
//! The output targets optimising SMT solvers in the z3 family: linear integer
//! arithmetic, lookup tables as `define-fun` chains of `ite`, and a single
//! `minimize` directive.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{Comparison, FdModel, IntVar, Literal, ModelVisitor, Objective, VarId};

use super::ModelTranslator;

/// Writes `.smt2` files
#[derive(Debug, Clone, Default)]
pub struct SmtLibWriter;

impl SmtLibWriter {
    pub fn new() -> Self {
        SmtLibWriter
    }
}

impl ModelTranslator for SmtLibWriter {
    fn extension(&self) -> &'static str {
        "smt2"
    }

    fn translate(&self, model: &FdModel) -> Result<String> {
        model.validate()?;
        let mut emitter = Emitter {
            model,
            out: String::new(),
            tables: HashMap::new(),
            matrices: HashMap::new(),
        };
        emitter.out.push_str(&format!("; {}\n", model.name));
        emitter.out.push_str("(set-option :produce-models true)\n");
        emitter.out.push_str("(set-logic QF_LIA)\n");
        model.walk(&mut emitter);
        emitter.out.push_str("(check-sat)\n(get-objectives)\n(get-model)\n");
        Ok(emitter.out)
    }
}

struct Emitter<'m> {
    model: &'m FdModel,
    out: String,
    /// Emitted lookup functions, keyed by table address
    tables: HashMap<usize, String>,
    matrices: HashMap<usize, String>,
}

fn int(value: i64) -> String {
    if value < 0 {
        format!("(- {})", -(value as i128))
    } else {
        value.to_string()
    }
}

fn sum(parts: Vec<String>) -> String {
    match parts.len() {
        0 => "0".to_string(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("(+ {})", parts.join(" ")),
    }
}

fn relation(cmp: Comparison, lhs: &str, rhs: &str) -> String {
    match cmp {
        Comparison::Ne => format!("(not (= {} {}))", lhs, rhs),
        other => format!("({} {} {})", other.symbol(), lhs, rhs),
    }
}

impl<'m> Emitter<'m> {
    fn name(&self, var: VarId) -> &str {
        &self.model.var(var).name
    }

    fn literal(&self, lit: &Literal) -> String {
        relation(lit.cmp, self.name(lit.var), &int(lit.value))
    }

    fn assert(&mut self, formula: String) {
        self.out.push_str("(assert ");
        self.out.push_str(&formula);
        self.out.push_str(")\n");
    }

    fn table_function(&mut self, table: &Arc<Vec<i64>>) -> String {
        let key = Arc::as_ptr(table) as usize;
        if let Some(name) = self.tables.get(&key) {
            return name.clone();
        }
        let name = format!("table_{}", self.tables.len());
        let body = ite_chain("i", table);
        self.out.push_str(&format!("(define-fun {} ((i Int)) Int {})\n", name, body));
        self.tables.insert(key, name.clone());
        name
    }

    fn matrix_function(&mut self, matrix: &Arc<Vec<Vec<i64>>>) -> String {
        let key = Arc::as_ptr(matrix) as usize;
        if let Some(name) = self.matrices.get(&key) {
            return name.clone();
        }
        let name = format!("matrix_{}", self.matrices.len());
        let rows: Vec<String> = matrix.iter().map(|row| ite_chain("j", row)).collect();
        let body = ite_chain_of("i", &rows);
        self.out.push_str(&format!("(define-fun {} ((i Int) (j Int)) Int {})\n", name, body));
        self.matrices.insert(key, name.clone());
        name
    }
}

/// `(ite (= x 0) v0 (ite (= x 1) v1 ... vlast))`
fn ite_chain(index: &str, values: &[i64]) -> String {
    let rendered: Vec<String> = values.iter().map(|&v| int(v)).collect();
    ite_chain_of(index, &rendered)
}

fn ite_chain_of(index: &str, values: &[String]) -> String {
    match values.split_last() {
        None => "0".to_string(),
        Some((last, init)) => {
            let mut body = last.clone();
            for (k, value) in init.iter().enumerate().rev() {
                body = format!("(ite (= {} {}) {} {})", index, k, value, body);
            }
            body
        }
    }
}

impl<'m> ModelVisitor for Emitter<'m> {
    fn visit_var(&mut self, _id: VarId, var: &IntVar) {
        self.out.push_str(&format!("(declare-const {} Int)\n", var.name));
        self.assert(format!("(and (<= {} {}) (<= {} {}))", int(var.min), var.name, var.name, int(var.max)));
    }

    fn visit_linear(&mut self, terms: &[(i64, VarId)], cmp: Comparison, rhs: i64) {
        let parts = terms
            .iter()
            .map(|&(coef, var)| match coef {
                1 => self.name(var).to_string(),
                _ => format!("(* {} {})", int(coef), self.name(var)),
            })
            .collect();
        let formula = relation(cmp, &sum(parts), &int(rhs));
        self.assert(formula);
    }

    fn visit_implication(&mut self, premise: &Literal, conclusion: &Literal) {
        let formula = format!("(=> {} {})", self.literal(premise), self.literal(conclusion));
        self.assert(formula);
    }

    fn visit_exactly_one(&mut self, vars: &[VarId], value: i64) {
        let parts = vars
            .iter()
            .map(|&var| format!("(ite (= {} {}) 1 0)", self.name(var), int(value)))
            .collect();
        let formula = format!("(= {} 1)", sum(parts));
        self.assert(formula);
    }

    fn visit_element_sum(&mut self, target: VarId, table: &Arc<Vec<i64>>, indices: &[VarId]) {
        let function = self.table_function(table);
        let parts = indices
            .iter()
            .map(|&var| format!("({} {})", function, self.name(var)))
            .collect();
        let formula = format!("(= {} {})", self.name(target), sum(parts));
        self.assert(formula);
    }

    fn visit_path_sum(&mut self, target: VarId, matrix: &Arc<Vec<Vec<i64>>>, path: &[VarId]) {
        let function = self.matrix_function(matrix);
        let parts = path
            .windows(2)
            .map(|step| format!("({} {} {})", function, self.name(step[0]), self.name(step[1])))
            .collect();
        let formula = format!("(= {} {})", self.name(target), sum(parts));
        self.assert(formula);
    }

    fn visit_maximum(&mut self, target: VarId, args: &[VarId]) {
        let t = self.name(target).to_string();
        let above: Vec<String> = args.iter().map(|&a| format!("(>= {} {})", t, self.name(a))).collect();
        let reached: Vec<String> = args.iter().map(|&a| format!("(= {} {})", t, self.name(a))).collect();
        self.assert(format!("(and {} true)", above.join(" ")));
        self.assert(format!("(or {} false)", reached.join(" ")));
    }

    fn visit_sentinel_le(&mut self, lhs: VarId, rhs: VarId, sentinel: i64, substitute: i64) {
        let key = |name: &str| format!("(ite (= {} {}) {} {})", name, int(sentinel), int(substitute), name);
        let formula = format!("(<= {} {})", key(self.name(lhs)), key(self.name(rhs)));
        self.assert(formula);
    }

    fn visit_objective(&mut self, objective: &Objective) {
        match objective {
            Objective::Minimize(var) => {
                let line = format!("(minimize {})\n", self.name(*var));
                self.out.push_str(&line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Bounds;
    use crate::instance::McpInstance;
    use crate::model::{Constraint, ModelBuilder, SymmetryBreaking};

    #[test]
    fn test_ite_chain() {
        assert_eq!(ite_chain("i", &[4, -2, 0]), "(ite (= i 0) 4 (ite (= i 1) (- 2) 0))");
        assert_eq!(ite_chain("i", &[]), "0");
    }

    #[test]
    fn test_small_model() {
        let mut model = FdModel::new("small");
        let x = model.add_var(IntVar::new("x", -1, 5));
        let y = model.add_var(IntVar::new("y", 0, 5));
        let m = model.add_var(IntVar::new("m", 0, 5));
        model.add_linear(vec![(1, x), (-2, y)], Comparison::Ne, 3);
        model.add_constraint(Constraint::Maximum { target: m, args: vec![x, y] });
        model.set_objective(Objective::Minimize(m));

        let text = SmtLibWriter::new().translate(&model).unwrap();
        assert!(text.contains("(declare-const x Int)"));
        assert!(text.contains("(assert (and (<= (- 1) x) (<= x 5)))"));
        assert!(text.contains("(assert (not (= (+ x (* (- 2) y)) 3)))"));
        assert!(text.contains("(assert (and (>= m x) (>= m y) true))"));
        assert!(text.contains("(minimize m)"));
        assert!(text.trim_end().ends_with("(get-model)"));
    }

    #[test]
    fn test_route_model_shares_tables() {
        let instance = McpInstance::random("r", 3, 4, 1).unwrap();
        let bounds = Bounds::compute(&instance).unwrap();
        let route = ModelBuilder::new(&instance, &bounds)
            .with_symmetry_breaking(SymmetryBreaking::Lexicographic)
            .build()
            .unwrap();
        let text = SmtLibWriter::new().translate(&route.model).unwrap();

        // one size table and one distance matrix for all couriers
        assert_eq!(text.matches("(define-fun table_").count(), 1);
        assert_eq!(text.matches("(define-fun matrix_").count(), 1);
        assert_eq!(text.matches("(declare-const ").count(), route.model.var_count());
        assert!(text.contains("(minimize max_distance)"));
    }
}
