//! Build script: embeds the git hash and checks GPU toolkits for the
//! in-process whisper backend before whisper-rs-sys tries to compile.

use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        require_tool("nvcc", &["--version"], "CUDA toolkit", "https://developer.nvidia.com/cuda-downloads");
    }
    if cfg!(feature = "vulkan") {
        require_tool("vulkaninfo", &["--summary"], "Vulkan SDK", "https://vulkan.lunarg.com/");
    }
}

fn require_tool(program: &str, args: &[&str], toolkit: &str, url: &str) {
    if Command::new(program).args(args).output().is_err() {
        panic!(
            "\n\n`{program}` not found: the {toolkit} is not installed.\n\
             Install: {url}\n\
             Or build without GPU support: cargo build --release --features whisper\n",
        );
    }
    println!("cargo::warning={toolkit} detected");
}
