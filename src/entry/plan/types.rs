use crate::config::RunSettings;
use crate::domain::TestSuite;

pub(in crate::entry) enum RunPlan {
    Phases(TestSuite),
    Run(Box<RunSettings>),
}
