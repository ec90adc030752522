use super::CoordinatorError;

impl From<&'static str> for CoordinatorError {
    fn from(message: &'static str) -> Self {
        CoordinatorError::TestExpectation { message }
    }
}

impl From<String> for CoordinatorError {
    fn from(value: String) -> Self {
        CoordinatorError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}
