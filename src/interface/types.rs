pub type InputValue = Vec<u8>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Status(String),
    Error(String),
    Integer(i64),
    BulkString(Vec<u8>),
    Array(Vec<Reply>),
    Ok,
}

impl Reply {
    pub fn error(msg: impl AsRef<str>) -> Self {
        Reply::Error(format!("ERR {}", msg.as_ref()))
    }

    pub fn to_bytes_vec(&self) -> Vec<u8> {
        match self {
            Reply::Status(s) => [b"+", s.as_bytes(), b"\r\n"].concat(),
            Reply::Error(s) => [b"-", s.as_bytes(), b"\r\n"].concat(),
            Reply::Integer(i) => [b":", i.to_string().as_bytes(), b"\r\n"].concat(),
            Reply::BulkString(ref v) => [
                b"$",
                v.len().to_string().as_bytes(),
                b"\r\n",
                v.as_slice(),
                b"\r\n",
            ]
            .concat(),
            Reply::Array(ref items) => {
                let mut output = Vec::new();
                output.extend(b"*");
                output.extend(items.len().to_string().as_bytes());
                output.extend(b"\r\n");
                for item in items {
                    output.extend(item.to_bytes_vec());
                }
                output
            }
            Reply::Ok => b"+OK\r\n".to_vec(),
        }
    }
}

impl From<Option<String>> for Reply {
    /// A status line if there is something to print, `+OK` otherwise.
    fn from(status: Option<String>) -> Self {
        status.map(Reply::Status).unwrap_or(Reply::Ok)
    }
}
