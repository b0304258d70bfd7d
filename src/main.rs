use clap::{Parser, Subcommand};
use dotenv::dotenv;

use casegen_rs::config::Settings;
use casegen_rs::document::ParsedDocument;
use casegen_rs::extract::ResultExtractor;
use casegen_rs::llm::{create_model, Provider};
use casegen_rs::workflow::markers::{SKIP_SENTINEL, STOP_SENTINEL};
use casegen_rs::workflow::ClarificationWorkflow;

use std::io::Write;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
    /// Generate test cases from a requirement document, answering
    /// clarification questions interactively
    Generate {
        /// Path to the requirement document (markdown/text, or a JSON
        /// ParsedDocument produced by an external converter)
        #[arg(short, long)]
        file: String,

        /// LLM provider (openai, deepseek, kimi, anthropic, gemini)
        #[arg(long, default_value = "openai")]
        provider: String,

        /// The model to use
        #[arg(short, long, default_value = "gpt-4o")]
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Serve { port } => {
            casegen_rs::server::serve(port).await?;
        }
        Commands::Generate {
            file,
            provider,
            model: model_name,
        } => {
            let provider: Provider = provider.parse()?;
            let model = create_model(provider, model_name)?;

            let document = load_document(&file)?;
            let settings = Settings::from_env();
            let base_prompt = settings.load_system_prompt()?;

            let workflow = ClarificationWorkflow::new(model, base_prompt);

            println!("Analyzing document: {}", file);
            let (thread_id, mut state) = workflow.start(&document, None).await?;

            while state.has_clarification && !state.is_stopped {
                println!("\n待澄清问题：\n{}\n", state.clarification_questions);
                println!(
                    "请输入澄清信息（'{}' 跳过，'{}' 终止）：",
                    SKIP_SENTINEL, STOP_SENTINEL
                );
                print!("> ");
                std::io::stdout().flush()?;

                let mut answer = String::new();
                std::io::stdin().read_line(&mut answer)?;

                state = workflow.resume(&thread_id, answer.trim()).await?;
            }

            if state.is_stopped {
                println!("已终止生成。");
                return Ok(());
            }

            let extractor = ResultExtractor::new(&settings.output_dir)?;
            let report = state.report_markdown.clone();
            let filename = file.clone();
            let artifacts = tokio::task::spawn_blocking(move || {
                extractor.extract_and_save(&report, 1, &filename)
            })
            .await??;

            println!("生成完成：");
            println!("  测试用例: {}", artifacts.spreadsheet.display());
            println!("  总结: {}", artifacts.summary.display());
            println!("  完整输出: {}", artifacts.full_output.display());
        }
    }

    Ok(())
}

/// Load a requirement document: `.json` files are deserialized as a
/// ParsedDocument, anything else is wrapped as plain markdown.
fn load_document(path: &str) -> Result<ParsedDocument, Box<dyn std::error::Error + Send + Sync>> {
    if path.ends_with(".json") {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(ParsedDocument::from_text_file(path)?)
    }
}
