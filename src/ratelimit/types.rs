/// Outcome of spending tokens for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited,
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Request kinds that are charged against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

/// Token price of each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCosts {
    pub post: u32,
    pub get: u32,
}

impl TokenCosts {
    pub fn cost_of(&self, op: Operation) -> u32 {
        match op {
            Operation::Read => self.get,
            Operation::Write => self.post,
        }
    }
}

impl Default for TokenCosts {
    fn default() -> Self {
        Self { post: 3, get: 1 }
    }
}
