
mod invariant_test;
