//! Flat MiniZinc rendering of a finite-domain model.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{Comparison, FdModel, IntVar, Literal, ModelVisitor, Objective, VarId};

use super::ModelTranslator;

/// Writes `.mzn` files
#[derive(Debug, Clone, Default)]
pub struct MiniZincWriter;

impl MiniZincWriter {
    pub fn new() -> Self {
        MiniZincWriter
    }
}

impl ModelTranslator for MiniZincWriter {
    fn extension(&self) -> &'static str {
        "mzn"
    }

    fn translate(&self, model: &FdModel) -> Result<String> {
        model.validate()?;
        let mut emitter = Emitter {
            model,
            out: format!("% {}\n", model.name),
            arrays: HashMap::new(),
        };
        model.walk(&mut emitter);
        Ok(emitter.out)
    }
}

struct Emitter<'m> {
    model: &'m FdModel,
    out: String,
    arrays: HashMap<usize, String>,
}

fn join(values: &[i64]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

fn sum(parts: Vec<String>) -> String {
    if parts.is_empty() {
        "0".to_string()
    } else {
        parts.join(" + ")
    }
}

impl<'m> Emitter<'m> {
    fn name(&self, var: VarId) -> &str {
        &self.model.var(var).name
    }

    fn literal(&self, lit: &Literal) -> String {
        format!("({} {} {})", self.name(lit.var), lit.cmp.symbol(), lit.value)
    }

    fn constraint(&mut self, body: String) {
        self.out.push_str("constraint ");
        self.out.push_str(&body);
        self.out.push_str(";\n");
    }

    fn table_array(&mut self, table: &Arc<Vec<i64>>) -> String {
        let key = Arc::as_ptr(table) as usize;
        if let Some(name) = self.arrays.get(&key) {
            return name.clone();
        }
        let name = format!("table_{}", self.arrays.len());
        self.out.push_str(&format!(
            "array[0..{}] of int: {} = array1d(0..{}, [{}]);\n",
            table.len() as i64 - 1,
            name,
            table.len() as i64 - 1,
            join(table)
        ));
        self.arrays.insert(key, name.clone());
        name
    }

    fn matrix_array(&mut self, matrix: &Arc<Vec<Vec<i64>>>) -> String {
        let key = Arc::as_ptr(matrix) as usize;
        if let Some(name) = self.arrays.get(&key) {
            return name.clone();
        }
        let name = format!("table_{}", self.arrays.len());
        let last = matrix.len() as i64 - 1;
        let flat: Vec<i64> = matrix.iter().flatten().copied().collect();
        self.out.push_str(&format!(
            "array[0..{}, 0..{}] of int: {} = array2d(0..{}, 0..{}, [{}]);\n",
            last,
            last,
            name,
            last,
            last,
            join(&flat)
        ));
        self.arrays.insert(key, name.clone());
        name
    }
}

impl<'m> ModelVisitor for Emitter<'m> {
    fn visit_var(&mut self, _id: VarId, var: &IntVar) {
        self.out.push_str(&format!("var {}..{}: {};\n", var.min, var.max, var.name));
    }

    fn visit_linear(&mut self, terms: &[(i64, VarId)], cmp: Comparison, rhs: i64) {
        let parts = terms
            .iter()
            .map(|&(coef, var)| match coef {
                1 => self.name(var).to_string(),
                _ => format!("{}*{}", coef, self.name(var)),
            })
            .collect();
        let body = format!("{} {} {}", sum(parts), cmp.symbol(), rhs);
        self.constraint(body);
    }

    fn visit_implication(&mut self, premise: &Literal, conclusion: &Literal) {
        let body = format!("{} -> {}", self.literal(premise), self.literal(conclusion));
        self.constraint(body);
    }

    fn visit_exactly_one(&mut self, vars: &[VarId], value: i64) {
        let parts: Vec<String> = vars
            .iter()
            .map(|&var| format!("bool2int({} = {})", self.name(var), value))
            .collect();
        let body = format!("sum([{}]) = 1", parts.join(", "));
        self.constraint(body);
    }

    fn visit_element_sum(&mut self, target: VarId, table: &Arc<Vec<i64>>, indices: &[VarId]) {
        let array = self.table_array(table);
        let parts = indices
            .iter()
            .map(|&var| format!("{}[{}]", array, self.name(var)))
            .collect();
        let body = format!("{} = {}", self.name(target), sum(parts));
        self.constraint(body);
    }

    fn visit_path_sum(&mut self, target: VarId, matrix: &Arc<Vec<Vec<i64>>>, path: &[VarId]) {
        let array = self.matrix_array(matrix);
        let parts = path
            .windows(2)
            .map(|step| format!("{}[{}, {}]", array, self.name(step[0]), self.name(step[1])))
            .collect();
        let body = format!("{} = {}", self.name(target), sum(parts));
        self.constraint(body);
    }

    fn visit_maximum(&mut self, target: VarId, args: &[VarId]) {
        let names: Vec<&str> = args.iter().map(|&a| self.name(a)).collect();
        let body = format!("{} = max([{}])", self.name(target), names.join(", "));
        self.constraint(body);
    }

    fn visit_sentinel_le(&mut self, lhs: VarId, rhs: VarId, sentinel: i64, substitute: i64) {
        let key = |name: &str| format!("(if {} = {} then {} else {} endif)", name, sentinel, substitute, name);
        let body = format!("{} <= {}", key(self.name(lhs)), key(self.name(rhs)));
        self.constraint(body);
    }

    fn visit_objective(&mut self, objective: &Objective) {
        match objective {
            Objective::Minimize(var) => {
                let line = format!("solve minimize {};\n", self.name(*var));
                self.out.push_str(&line);
            }
        }
    }
}
