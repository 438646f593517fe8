fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-env-changed=SASTOPO_VERSION");
    Ok(())
}
