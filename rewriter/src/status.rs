// Enumerated process exit statuses.
//
// Downstream tooling scripts on these numbers; they are part of the CLI
// contract and never reordered.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Ok = 0,
    TooManyHostFilesSupplied = 1,
    NoHostFileSupplied = 2,
    FakeHeaderAlreadyPresent = 3,
    FakeHeaderMissingOnRemoval = 4,
    NothingToInstrument = 5,
    /// Fatal I/O, configuration, parse, or rewrite failure. Deliberately
    /// outside the 0..=5 range so it can never alias an enumerated status.
    Fatal = 10,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ExitStatus::Ok => "ok",
            ExitStatus::TooManyHostFilesSupplied => "too many host files supplied",
            ExitStatus::NoHostFileSupplied => "no host file supplied",
            ExitStatus::FakeHeaderAlreadyPresent => "fake header already present",
            ExitStatus::FakeHeaderMissingOnRemoval => "no fake header to remove",
            ExitStatus::NothingToInstrument => "nothing to instrument",
            ExitStatus::Fatal => "fatal error",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ExitStatus::Ok.code(), 0);
        assert_eq!(ExitStatus::TooManyHostFilesSupplied.code(), 1);
        assert_eq!(ExitStatus::NoHostFileSupplied.code(), 2);
        assert_eq!(ExitStatus::FakeHeaderAlreadyPresent.code(), 3);
        assert_eq!(ExitStatus::FakeHeaderMissingOnRemoval.code(), 4);
        assert_eq!(ExitStatus::NothingToInstrument.code(), 5);
    }

    #[test]
    fn fatal_code_is_outside_the_scripted_range() {
        assert_eq!(ExitStatus::Fatal.code(), 10);
        let scripted = [
            ExitStatus::Ok,
            ExitStatus::TooManyHostFilesSupplied,
            ExitStatus::NoHostFileSupplied,
            ExitStatus::FakeHeaderAlreadyPresent,
            ExitStatus::FakeHeaderMissingOnRemoval,
            ExitStatus::NothingToInstrument,
        ];
        for status in scripted {
            assert_ne!(status.code(), ExitStatus::Fatal.code());
        }
    }
}
