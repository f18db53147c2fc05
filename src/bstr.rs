use std::borrow::Cow;

pub trait BStr {
    // required methods
    fn to_str(&self) -> Option<&str>;
    fn to_lower_string(&self) -> Option<String>;
    fn to_lossy(&self) -> Cow<'_, str>;
}

impl<S: AsRef<[u8]> + ?Sized> BStr for S {
    fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_ref()).ok()
    }

    fn to_lower_string(&self) -> Option<String> {
        self.to_str().map(str::to_ascii_lowercase)
    }

    fn to_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_ref())
    }
}
