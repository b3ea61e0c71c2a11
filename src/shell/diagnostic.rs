macro_rules! diagnostic {
    ($str:expr) => {{
        eprintln_ignore_io_error!("minish: {}", format!($str));
    }};
}

pub(crate) use diagnostic;
