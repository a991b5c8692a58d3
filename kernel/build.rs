//! Wires the kernel binary to its linker script. Limine needs the kernel
//! placed in the higher half with the `.requests` section kept intact, which
//! the default target linker script doesn't know how to do.

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let script = std::path::Path::new(&manifest_dir).join("linker.ld");
    println!("cargo:rustc-link-arg-bin=kernel=-T{}", script.display());
    println!("cargo:rerun-if-changed={}", script.display());
}
