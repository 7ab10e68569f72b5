mod admin;
mod cohort;
mod common;
mod decision;
