//! Integration tests for reldeploy

mod support;
mod test_hosts;
mod test_orchestrator;
mod test_release;
