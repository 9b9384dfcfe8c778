//! Solver-neutral linear program
//!
//! The model builder and relaxer only ever talk to this representation;
//! translating it into a concrete engine happens in `solver`.

use serde::Serialize;

/// Handle to a column of a [`LinearProgram`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LpVariable {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    /// Coefficient in the minimized objective
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LpConstraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

impl LpConstraint {
    /// Left-hand side evaluated at `values`
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v.0]).sum()
    }

    pub fn is_satisfied(&self, values: &[f64], tol: f64) -> bool {
        let lhs = self.lhs(values);
        match self.relation {
            Relation::Eq => (lhs - self.rhs).abs() <= tol,
            Relation::Le => lhs <= self.rhs + tol,
            Relation::Ge => lhs >= self.rhs - tol,
        }
    }
}

/// Minimization problem over continuous bounded variables
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinearProgram {
    variables: Vec<LpVariable>,
    constraints: Vec<LpConstraint>,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, name: impl Into<String>, lower: f64, upper: f64, cost: f64) -> VarId {
        self.variables.push(LpVariable {
            name: name.into(),
            lower,
            upper,
            cost,
        });
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        relation: Relation,
        rhs: f64,
    ) {
        self.constraints.push(LpConstraint {
            name: name.into(),
            terms,
            relation,
            rhs,
        });
    }

    pub fn variable(&self, id: VarId) -> &LpVariable {
        &self.variables[id.0]
    }

    pub fn set_upper(&mut self, id: VarId, upper: f64) {
        self.variables[id.0].upper = upper;
    }

    pub fn set_cost(&mut self, id: VarId, cost: f64) {
        self.variables[id.0].cost = cost;
    }

    pub fn variables(&self) -> &[LpVariable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[LpConstraint] {
        &self.constraints
    }

    pub fn num_vars(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Objective value at `values`
    pub fn objective(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, x)| v.cost * x)
            .sum()
    }

    /// Names of bounds and constraints violated by more than `tol`
    pub fn violations(&self, values: &[f64], tol: f64) -> Vec<String> {
        let bounds = self
            .variables
            .iter()
            .zip(values)
            .filter(|(v, &x)| x < v.lower - tol || x > v.upper + tol)
            .map(|(v, _)| v.name.clone());
        let rows = self
            .constraints
            .iter()
            .filter(|c| !c.is_satisfied(values, tol))
            .map(|c| c.name.clone());
        bounds.chain(rows).collect()
    }
}
