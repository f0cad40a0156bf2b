mod common;
mod eligibility;
mod evaluations;
