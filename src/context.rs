use crate::DumpRead;
use crate::Error;
use crate::Layout;
use crate::PositionReader;

/// The calling context of a frame: what the caller expects back.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Gimme {
    Void,
    Scalar,
    Array,
}

impl Gimme {
    fn from_u8(value: u8, position: u64) -> Result<Self, Error> {
        match value {
            0 => Ok(Self::Void),
            1 => Ok(Self::Scalar),
            2 => Ok(Self::Array),
            tag => Err(Error::UnknownTag { tag, position }),
        }
    }
}

impl std::fmt::Display for Gimme {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::Void => "void",
            Self::Scalar => "scalar",
            Self::Array => "array",
        };
        write!(f, "{}", s)
    }
}

/// One frame of the dumped call-context stack.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Context {
    /// A subroutine call.
    Sub {
        /// Calling context.
        gimme: Gimme,
        /// Source file of the call site.
        file: Option<Vec<u8>>,
        /// Source line of the call site.
        line: u64,
        /// Address of the called code object.
        cv_at: u64,
        /// Address of the arguments array, zero if unavailable.
        args_at: u64,
    },
    /// An eval-block (`try`) scope.
    Try {
        /// Calling context.
        gimme: Gimme,
        /// Source file of the call site.
        file: Option<Vec<u8>>,
        /// Source line of the call site.
        line: u64,
    },
    /// A string eval.
    Eval {
        /// Calling context.
        gimme: Gimme,
        /// Source file of the call site.
        file: Option<Vec<u8>>,
        /// Source line of the call site.
        line: u64,
        /// Address of the scalar holding the source text.
        code_at: u64,
    },
}

pub(crate) mod tags {
    pub const SUB: u8 = 1;
    pub const TRY: u8 = 2;
    pub const EVAL: u8 = 3;
}

impl Context {
    /// The calling context of the frame.
    pub fn gimme(&self) -> Gimme {
        match self {
            Self::Sub { gimme, .. } | Self::Try { gimme, .. } | Self::Eval { gimme, .. } => *gimme,
        }
    }

    /// Source file of the call site.
    pub fn file(&self) -> Option<&[u8]> {
        match self {
            Self::Sub { file, .. } | Self::Try { file, .. } | Self::Eval { file, .. } => {
                file.as_deref()
            }
        }
    }

    /// Source line of the call site.
    pub fn line(&self) -> u64 {
        match self {
            Self::Sub { line, .. } | Self::Try { line, .. } | Self::Eval { line, .. } => *line,
        }
    }

    pub(crate) fn read_record<R: std::io::Read>(
        reader: &mut PositionReader<R>,
        tag: u8,
        layout: Layout,
    ) -> Result<Self, Error> {
        if !matches!(tag, tags::SUB | tags::TRY | tags::EVAL) {
            return Err(Error::UnknownTag {
                tag,
                position: reader.position().saturating_sub(1),
            });
        }
        let gimme_position = reader.position();
        let gimme = Gimme::from_u8(reader.read_u8()?, gimme_position)?;
        let file = reader.read_str(layout)?;
        let line = reader.read_uint(layout)?;
        match tag {
            tags::SUB => Ok(Self::Sub {
                gimme,
                file,
                line,
                cv_at: reader.read_ptr(layout)?,
                args_at: reader.read_ptr(layout)?,
            }),
            tags::TRY => Ok(Self::Try { gimme, file, line }),
            _ => Ok(Self::Eval {
                gimme,
                file,
                line,
                code_at: reader.read_ptr(layout)?,
            }),
        }
    }
}
