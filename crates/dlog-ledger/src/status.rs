use std::fmt;

/// Numeric completion status reported by the ledger store.
///
/// The store reports every request outcome as an integer code. Known codes
/// have named constants; any other value is preserved verbatim so it can be
/// surfaced to callers unchanged.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(i32);

impl StatusCode {
    pub const OK: Self = Self(0);
    pub const READ_EXCEPTION: Self = Self(-1);
    pub const QUORUM_EXCEPTION: Self = Self(-2);
    pub const NO_BOOKIE_AVAILABLE: Self = Self(-3);
    pub const DIGEST_NOT_INITIALIZED: Self = Self(-4);
    pub const DIGEST_MATCH: Self = Self(-5);
    pub const NOT_ENOUGH_BOOKIES: Self = Self(-6);
    pub const NO_SUCH_LEDGER_EXISTS: Self = Self(-7);
    pub const BOOKIE_HANDLE_NOT_AVAILABLE: Self = Self(-8);
    pub const ZK_EXCEPTION: Self = Self(-9);
    pub const LEDGER_RECOVERY: Self = Self(-10);
    pub const LEDGER_CLOSED: Self = Self(-11);
    pub const WRITE_EXCEPTION: Self = Self(-12);
    pub const NO_SUCH_ENTRY: Self = Self(-13);
    pub const INCORRECT_PARAMETER: Self = Self(-14);
    pub const INTERRUPTED: Self = Self(-15);
    pub const PROTOCOL_VERSION: Self = Self(-16);
    pub const METADATA_VERSION: Self = Self(-17);
    pub const METASTORE: Self = Self(-18);
    pub const CLIENT_CLOSED: Self = Self(-19);
    pub const LEDGER_EXIST: Self = Self(-20);
    pub const ILLEGAL_OP: Self = Self(-100);
    pub const LEDGER_FENCED: Self = Self(-101);
    pub const UNAUTHORIZED_ACCESS: Self = Self(-102);
    pub const UNCLOSED_FRAGMENT: Self = Self(-103);
    pub const WRITE_ON_READ_ONLY_BOOKIE: Self = Self(-104);

    /// Wrap a raw status code as reported by the store.
    pub const fn from_raw(code: i32) -> Self {
        Self(code)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Human-readable description of the code.
    pub fn message(self) -> &'static str {
        match self {
            Self::OK => "no problem",
            Self::READ_EXCEPTION => "error while reading ledger",
            Self::QUORUM_EXCEPTION => "failed to get a quorum of responses",
            Self::NO_BOOKIE_AVAILABLE => "no bookie available",
            Self::DIGEST_NOT_INITIALIZED => "digest engine not initialized",
            Self::DIGEST_MATCH => "entry digest does not match",
            Self::NOT_ENOUGH_BOOKIES => "not enough bookies available",
            Self::NO_SUCH_LEDGER_EXISTS => "no such ledger exists",
            Self::BOOKIE_HANDLE_NOT_AVAILABLE => "bookie handle is not available",
            Self::ZK_EXCEPTION => "error while using the coordination service",
            Self::LEDGER_RECOVERY => "error while recovering ledger",
            Self::LEDGER_CLOSED => "attempt to write to a closed ledger",
            Self::WRITE_EXCEPTION => "write failed on bookie",
            Self::NO_SUCH_ENTRY => "no such entry",
            Self::INCORRECT_PARAMETER => "incorrect parameter",
            Self::INTERRUPTED => "interrupted while waiting for permit",
            Self::PROTOCOL_VERSION => "bookie protocol version mismatch",
            Self::METADATA_VERSION => "bad ledger metadata version",
            Self::METASTORE => "error while using the metastore",
            Self::CLIENT_CLOSED => "ledger client is closed",
            Self::LEDGER_EXIST => "ledger already exists",
            Self::ILLEGAL_OP => "invalid operation",
            Self::LEDGER_FENCED => "ledger has been fenced off by a recovery open",
            Self::UNAUTHORIZED_ACCESS => "attempted to access ledger with the wrong password",
            Self::UNCLOSED_FRAGMENT => "attempting to use an unclosed fragment",
            Self::WRITE_ON_READ_ONLY_BOOKIE => "attempting to write on a read-only bookie",
            _ => "unexpected condition",
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusCode({})", self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (rc={})", self.message(), self.0)
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}
