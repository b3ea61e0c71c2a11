#![forbid(unsafe_code)]

fn main() {
    minish::shell_main()
}
