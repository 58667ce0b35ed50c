use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A required operand role is absent from a source node
    MissingOperand { op: String, role: String },
    /// A required attribute is absent from a source node
    MissingAttr { op: String, attr: String },
    /// An attribute is present but has the wrong type
    AttrType {
        op: String,
        attr: String,
        expected: &'static str,
    },
    /// No lowering registered for this op type
    UnsupportedOp(String),
    /// Rank/shape incompatibility, including builder node rejection
    Shape(String),
    /// Source graph could not be decoded or resolved
    Parse(String),
    /// The reference evaluator cannot execute a value
    Eval(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingOperand { op, role } => {
                write!(f, "{op}: missing operand '{role}'")
            }
            Error::MissingAttr { op, attr } => {
                write!(f, "{op}: missing attribute '{attr}'")
            }
            Error::AttrType { op, attr, expected } => {
                write!(f, "{op}: attribute '{attr}' is not {expected}")
            }
            Error::UnsupportedOp(op) => write!(f, "unsupported op type: {op}"),
            Error::Shape(msg) => write!(f, "shape error: {msg}"),
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
            Error::Eval(msg) => write!(f, "eval error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
