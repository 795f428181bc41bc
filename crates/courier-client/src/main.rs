use clap::Parser;
use courier_client::{
    BlogCaller, CalculatorCaller, GreetCaller,
    cli::{BlogFields, CliArgs, Command},
    connect,
};
use courier_core::proto::{
    blog::Blog,
    calculator::RunningAverageRequest,
    greet::LongGreetRequest,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let channel = connect(args.server_url.clone()).await?;
    let ctx = args.context();

    match &args.command {
        Command::Sum { x, y } => {
            let result = CalculatorCaller::new(channel).sum(&ctx, *x, *y).await?;
            println!("{x} + {y} = {result}");
        }
        Command::SquareRoot { number } => {
            let root = CalculatorCaller::new(channel)
                .square_root(&ctx, *number)
                .await?;
            println!("sqrt({number}) = {root}");
        }
        Command::PrimeFactor { number } => {
            let mut factors = CalculatorCaller::new(channel)
                .prime_factor(ctx, *number)
                .await?;
            while let Some(res) = factors.next().await? {
                println!("{}", res.factor);
            }
        }
        Command::RunningAverage { numbers } => {
            let mut sender = CalculatorCaller::new(channel).running_average(ctx);
            for &number in numbers {
                println!("Sending {number}");
                sender.send(RunningAverageRequest { number }).await?;
            }
            println!("Average: {}", sender.finish().await?.average);
        }
        Command::RunningMax { numbers } => {
            let maxima = CalculatorCaller::new(channel)
                .running_max(&ctx, numbers.clone(), args.pace())
                .await?;
            for max in maxima {
                println!("New maximum: {max}");
            }
        }
        Command::Greet {
            first_name,
            last_name,
        } => {
            let result = GreetCaller::new(channel)
                .greet(&ctx, first_name, last_name)
                .await?;
            println!("{result}");
        }
        Command::GreetManyTimes { first_name } => {
            let mut greetings = GreetCaller::new(channel)
                .greet_many_times(ctx, first_name)
                .await?;
            while let Some(res) = greetings.next().await? {
                println!("{}", res.result);
            }
        }
        Command::LongGreet { names } => {
            let mut sender = GreetCaller::new(channel).long_greet(ctx);
            for first_name in names {
                sender
                    .send(LongGreetRequest {
                        first_name: first_name.clone(),
                    })
                    .await?;
            }
            println!("{}", sender.finish().await?.result);
        }
        Command::GreetEveryone { names } => {
            let replies = GreetCaller::new(channel)
                .greet_everyone(&ctx, names.clone(), args.pace())
                .await?;
            for reply in replies {
                println!("{reply}");
            }
        }
        Command::GreetWithDeadline { first_name } => {
            let result = GreetCaller::new(channel)
                .greet_with_deadline(&ctx, first_name)
                .await?;
            println!("{result}");
        }
        Command::CreateBlog(fields) => {
            let blog = BlogCaller::new(channel)
                .create(&ctx, to_blog(String::new(), fields))
                .await?;
            print_blog(&blog);
        }
        Command::ReadBlog { id } => {
            print_blog(&BlogCaller::new(channel).read(&ctx, id).await?);
        }
        Command::UpdateBlog { id, fields } => {
            let blog = BlogCaller::new(channel)
                .update(&ctx, to_blog(id.clone(), fields))
                .await?;
            print_blog(&blog);
        }
        Command::DeleteBlog { id } => {
            let deleted = BlogCaller::new(channel).delete(&ctx, id).await?;
            println!("Deleted blog {deleted}");
        }
        Command::ListBlog => {
            let mut blogs = BlogCaller::new(channel).list(ctx).await?;
            while let Some(res) = blogs.next().await? {
                if let Some(blog) = res.blog {
                    print_blog(&blog);
                }
            }
        }
    }

    Ok(())
}

fn to_blog(id: String, fields: &BlogFields) -> Blog {
    Blog {
        id,
        author_id: fields.author_id.clone(),
        title: fields.title.clone(),
        content: fields.content.clone(),
    }
}

fn print_blog(blog: &Blog) {
    println!(
        "{:<26} | {:<16} | {:<24} | {}",
        blog.id, blog.author_id, blog.title, blog.content
    );
}
