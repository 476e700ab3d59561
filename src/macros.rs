macro_rules! bail_parse {
    () => {
        return Err(crate::Error::new(crate::ErrorKind::Parse))
    };
    ($($arg: tt)+) => {
        return Err(crate::Error::with_context(
            crate::ErrorKind::Parse,
            format!($($arg)+),
        ))
    };
}

macro_rules! bail_invalid {
    ($($arg: tt)+) => {
        return Err(crate::Error::with_context(
            crate::ErrorKind::InvalidArgument,
            format!($($arg)+),
        ))
    };
}
